pub mod l5x;
