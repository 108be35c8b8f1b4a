//! Protobuf schema for command bodies.
//!
//! One message per command kind; the queue a body arrives on decides which
//! message it is decoded as. Timestamps use `google.protobuf.Timestamp`.

use chrono::{DateTime, Utc};
use prost::Message;
use prost_types::Timestamp;

use crate::domain::ports::{CommandDecoder, DecodeError};
use crate::domain::{
    Command, CommandKind, CreateKwek, CreateUser, DeleteKwek, DeleteUser, UpdateKwek, UpdateUser,
};

/// Wire form of [`CreateKwek`].
#[derive(Clone, PartialEq, Message)]
pub struct CreateKwekMessage {
    #[prost(string, tag = "1")]
    pub kwek_guid: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(string, tag = "3")]
    pub text: String,
    #[prost(message, optional, tag = "4")]
    pub posted_at: Option<Timestamp>,
}

/// Wire form of [`UpdateKwek`].
#[derive(Clone, PartialEq, Message)]
pub struct UpdateKwekMessage {
    #[prost(string, tag = "1")]
    pub kwek_guid: String,
    #[prost(string, tag = "2")]
    pub text: String,
    #[prost(message, optional, tag = "3")]
    pub updated_at: Option<Timestamp>,
}

/// Wire form of [`DeleteKwek`].
#[derive(Clone, PartialEq, Message)]
pub struct DeleteKwekMessage {
    #[prost(string, tag = "1")]
    pub kwek_guid: String,
}

/// Wire form of [`CreateUser`].
#[derive(Clone, PartialEq, Message)]
pub struct CreateUserMessage {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(string, tag = "2")]
    pub username: String,
    #[prost(string, tag = "3")]
    pub email: String,
    #[prost(string, tag = "4")]
    pub display_name: String,
    #[prost(string, tag = "5")]
    pub avatar_url: String,
    #[prost(message, optional, tag = "6")]
    pub created_at: Option<Timestamp>,
}

/// Wire form of [`UpdateUser`].
#[derive(Clone, PartialEq, Message)]
pub struct UpdateUserMessage {
    #[prost(string, tag = "1")]
    pub user_id: String,
    #[prost(string, optional, tag = "2")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub email: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub display_name: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub avatar_url: Option<String>,
    #[prost(message, optional, tag = "6")]
    pub updated_at: Option<Timestamp>,
}

/// Wire form of [`DeleteUser`].
#[derive(Clone, PartialEq, Message)]
pub struct DeleteUserMessage {
    #[prost(string, tag = "1")]
    pub user_id: String,
}

/// [`CommandDecoder`] for protobuf bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufDecoder;

impl CommandDecoder for ProtobufDecoder {
    fn decode(&self, kind: CommandKind, body: &[u8]) -> Result<Command, DecodeError> {
        let malformed = |err: prost::DecodeError| DecodeError::malformed(kind, err.to_string());
        let command = match kind {
            CommandKind::CreateKwek => {
                let message = CreateKwekMessage::decode(body).map_err(malformed)?;
                Command::CreateKwek(CreateKwek {
                    kwek_guid: message.kwek_guid,
                    user_id: message.user_id,
                    text: message.text,
                    posted_at: timestamp(kind, message.posted_at)?,
                })
            }
            CommandKind::UpdateKwek => {
                let message = UpdateKwekMessage::decode(body).map_err(malformed)?;
                Command::UpdateKwek(UpdateKwek {
                    kwek_guid: message.kwek_guid,
                    text: message.text,
                    updated_at: timestamp(kind, message.updated_at)?,
                })
            }
            CommandKind::DeleteKwek => {
                let message = DeleteKwekMessage::decode(body).map_err(malformed)?;
                Command::DeleteKwek(DeleteKwek {
                    kwek_guid: message.kwek_guid,
                })
            }
            CommandKind::CreateUser => {
                let message = CreateUserMessage::decode(body).map_err(malformed)?;
                Command::CreateUser(CreateUser {
                    user_id: message.user_id,
                    username: message.username,
                    email: message.email,
                    display_name: message.display_name,
                    avatar_url: message.avatar_url,
                    created_at: timestamp(kind, message.created_at)?,
                })
            }
            CommandKind::UpdateUser => {
                let message = UpdateUserMessage::decode(body).map_err(malformed)?;
                Command::UpdateUser(UpdateUser {
                    user_id: message.user_id,
                    username: message.username,
                    email: message.email,
                    display_name: message.display_name,
                    avatar_url: message.avatar_url,
                    updated_at: timestamp(kind, message.updated_at)?,
                })
            }
            CommandKind::DeleteUser => {
                let message = DeleteUserMessage::decode(body).map_err(malformed)?;
                Command::DeleteUser(DeleteUser {
                    user_id: message.user_id,
                })
            }
        };
        Ok(command)
    }
}

fn timestamp(
    kind: CommandKind,
    value: Option<Timestamp>,
) -> Result<Option<DateTime<Utc>>, DecodeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    u32::try_from(value.nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(value.seconds, nanos))
        .map(Some)
        .ok_or_else(|| {
            DecodeError::malformed(
                kind,
                format!(
                    "timestamp out of range: {}s {}ns",
                    value.seconds, value.nanos
                ),
            )
        })
}

fn to_timestamp(value: Option<DateTime<Utc>>) -> Option<Timestamp> {
    value.map(|value| Timestamp {
        seconds: value.timestamp(),
        nanos: i32::try_from(value.timestamp_subsec_nanos()).unwrap_or(i32::MAX),
    })
}

/// Encode `command` as the body its queue expects.
pub fn encode_command(command: &Command) -> Vec<u8> {
    match command {
        Command::CreateKwek(kwek) => CreateKwekMessage {
            kwek_guid: kwek.kwek_guid.clone(),
            user_id: kwek.user_id.clone(),
            text: kwek.text.clone(),
            posted_at: to_timestamp(kwek.posted_at),
        }
        .encode_to_vec(),
        Command::UpdateKwek(kwek) => UpdateKwekMessage {
            kwek_guid: kwek.kwek_guid.clone(),
            text: kwek.text.clone(),
            updated_at: to_timestamp(kwek.updated_at),
        }
        .encode_to_vec(),
        Command::DeleteKwek(kwek) => DeleteKwekMessage {
            kwek_guid: kwek.kwek_guid.clone(),
        }
        .encode_to_vec(),
        Command::CreateUser(user) => CreateUserMessage {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: to_timestamp(user.created_at),
        }
        .encode_to_vec(),
        Command::UpdateUser(user) => UpdateUserMessage {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            updated_at: to_timestamp(user.updated_at),
        }
        .encode_to_vec(),
        Command::DeleteUser(user) => DeleteUserMessage {
            user_id: user.user_id.clone(),
        }
        .encode_to_vec(),
    }
}
