pub(crate) mod handlers;
pub(crate) mod response_contract;
pub(crate) mod static_files;
