// Domain layer: core models, wire contracts and ports (interfaces).

pub mod model;
pub mod ports;
pub mod wire;
