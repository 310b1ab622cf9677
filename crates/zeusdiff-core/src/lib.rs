pub mod compare;
pub mod domain;
pub mod io;
pub mod numerics;
pub mod regression;
