//! SeaORM entities backing the channel store.

pub mod channel;
pub mod user;

pub mod prelude {
    pub use super::channel::Entity as Channel;
    pub use super::channel::Model as ChannelModel;
    pub use super::channel::ActiveModel as ChannelActiveModel;
    pub use super::channel::Column as ChannelColumn;

    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::Column as UserColumn;
}
