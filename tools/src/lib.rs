//! Command line helpers for `ivsparse`

pub mod mtx;
