mod blacklist;
mod cancel;
mod check;
mod clients;
mod history;

pub use blacklist::cmd_blacklist;
pub use cancel::cmd_cancel;
pub use check::cmd_check;
pub use clients::cmd_clients;
pub use history::cmd_history;
