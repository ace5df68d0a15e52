mod gradient;
mod linspace;

pub use {
    gradient::{gradient, slope},
    linspace::linspace,
};
