pub mod buckets;
pub mod cat;
pub mod check_home;
pub mod init;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod put;
pub mod resolve;
pub mod rm;
pub mod stat;

pub use buckets::Buckets;
pub use cat::Cat;
pub use check_home::CheckHome;
pub use init::Init;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use mv::Mv;
pub use put::Put;
pub use resolve::Resolve;
pub use rm::Rm;
pub use stat::Stat;
