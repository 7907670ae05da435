#![allow(dead_code)]

pub mod trip;
