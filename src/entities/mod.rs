//! Entity module - SeaORM definitions for every marketplace table.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Status-like columns are stored as text; their typed views live in `core::status`.

pub mod conversation;
pub mod feed_post;
pub mod message;
pub mod notification;
pub mod order;
pub mod product;
pub mod system_state;
pub mod user;

// Re-export specific types to avoid conflicts
pub use conversation::{
    Column as ConversationColumn, Entity as Conversation, Model as ConversationModel,
};
pub use feed_post::{Column as FeedPostColumn, Entity as FeedPost, Model as FeedPostModel};
pub use message::{Column as MessageColumn, Entity as Message, Model as MessageModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
