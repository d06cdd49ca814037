pub(crate) mod constants;
