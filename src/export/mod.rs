pub mod bundle;
pub mod freeze;
pub mod test_fixture;
