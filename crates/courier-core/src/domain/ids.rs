//! Domain identifiers (strongly-typed string tokens).
//!
//! キューが払い出す識別子はすべて不透明な文字列なので、
//! newtype で包んで取り違えをコンパイル時に防ぎます。
//! - `MessageId`: 論理メッセージの ID（再配送されても変わらない）
//! - `ReceiptHandle`: claim ごとの一回限りのトークン（再配送で変わる）
//! - `JobType`: dispatch 先を決める名前（`Function` 属性）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a logical message; stable across redeliveries.
    MessageId
);

string_id!(
    /// One-time token for a single claim. Required to delete the message.
    ///
    /// A redelivered message gets a fresh handle, so a handle identifies the
    /// claim, not the message.
    ReceiptHandle
);

string_id!(
    /// Name used to look up a handler in the registry.
    JobType
);

impl MessageId {
    /// Generate a fresh, time-sortable message id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }
}

impl ReceiptHandle {
    /// Generate a fresh receipt handle bound to `message`.
    ///
    /// The message id is embedded so a handle can be traced back in logs.
    pub fn generate(message: &MessageId) -> Self {
        Self(format!("{}#{}", message, Ulid::new()))
    }
}
