//! Unit tests for the public building blocks

mod periods;
