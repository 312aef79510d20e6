#![cfg(test)]

mod test_utils;
mod byte_order_tests;
mod types_tests;
