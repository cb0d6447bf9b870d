pub(crate) mod external;
pub(crate) mod plugin;
