pub mod aggregate;
pub mod consts;
pub mod error;
pub mod grouping;
pub mod io;
pub mod overlap;
pub mod pipeline;
pub mod register;
pub mod session;
pub mod solver;
pub mod view;
