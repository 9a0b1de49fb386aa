mod postgres;
mod stub;

pub use postgres::PostgresRoomAuthorizer;
pub use stub::StaticRoomAuthorizer;
