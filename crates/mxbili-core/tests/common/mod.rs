#![allow(dead_code)]

pub mod echo_server;
