// Native inference backends

pub mod pose;
