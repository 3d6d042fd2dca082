//! Namespace-scoped API facade injected into every plugin.
//!
//! Wraps outbound actions, exposes the plugin-to-plugin call entry point,
//! and carries the host-debug operations (event injection, metadata listing,
//! restart). The facade holds its collaborators (the adaptor, the
//! dispatcher, and a weak handle to the manager) explicitly rather than
//! reaching
//! for ambient singletons.

use std::sync::{Arc, Weak};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use beacon_core::event::MessageEvent;
use beacon_core::{
    ActionError, ActionResult, ActionResponse, BoxedAdaptor, CallEvent, CallResult, Event,
    await_resolution,
};

use crate::dispatcher::EventDispatcher;
use crate::manager::PluginManager;
use crate::plugin::PluginMeta;

/// Per-plugin facade over the host's outbound and call surfaces.
#[derive(Clone)]
pub struct Api {
    namespace: Arc<str>,
    adaptor: BoxedAdaptor,
    dispatcher: Arc<EventDispatcher>,
    manager: Weak<PluginManager>,
}

impl Api {
    /// Creates a facade scoped to `namespace`.
    pub fn new(
        namespace: &str,
        adaptor: BoxedAdaptor,
        dispatcher: Arc<EventDispatcher>,
        manager: Weak<PluginManager>,
    ) -> Self {
        Self {
            namespace: Arc::from(namespace),
            adaptor,
            dispatcher,
            manager,
        }
    }

    /// The namespace this facade is scoped to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // =========================================================================
    // Core surface
    // =========================================================================

    /// Issues a raw action and awaits its reply.
    pub async fn send(&self, action: &str, params: Value) -> ActionResult<ActionResponse> {
        debug!(plugin = %self.namespace, action = %action, "Action issued");
        self.adaptor.send(action, params).await
    }

    /// Calls a method exposed by another plugin and awaits its resolution.
    ///
    /// With a target, exactly the target's handler receives the call; a
    /// missing target rejects immediately. Without a target, the call is
    /// broadcast and the first resolution wins.
    pub async fn call(&self, target: Option<&str>, method: &str, params: Value) -> CallResult {
        let (event, rx) = CallEvent::new(
            self.namespace.as_ref(),
            target.map(str::to_string),
            method,
            params,
        );
        self.dispatcher.dispatch(Event::Call(event)).await;
        await_resolution(rx).await
    }

    /// Pushes an event into the dispatcher as if it arrived from the
    /// gateway. Debug aid.
    pub async fn push_event(&self, event: Event) {
        debug!(plugin = %self.namespace, "Custom event pushed");
        self.dispatcher.dispatch(event).await;
    }

    /// Metadata of every loaded plugin.
    pub async fn plugin_metas(&self) -> Vec<PluginMeta> {
        match self.manager.upgrade() {
            Some(manager) => manager.plugin_metas().await,
            None => Vec::new(),
        }
    }

    /// Stops, reloads, and restarts every plugin.
    pub async fn restart_plugins(&self) {
        info!(plugin = %self.namespace, "Plugin restart requested");
        if let Some(manager) = self.manager.upgrade() {
            manager.restart().await;
        }
    }

    // =========================================================================
    // Quick operations
    // =========================================================================

    /// Replies to a message event through the gateway's quick-operation
    /// endpoint.
    pub async fn reply(&self, event: &MessageEvent, text: &str) -> ActionResult<()> {
        let context = match event {
            MessageEvent::Private(ev) => {
                info!(plugin = %self.namespace, user_id = ev.user_id, "Reply sent");
                serde_json::to_value(ev)
            }
            MessageEvent::Group(ev) => {
                info!(plugin = %self.namespace, group_id = ev.group_id, "Reply sent");
                serde_json::to_value(ev)
            }
        }
        .map_err(|e| ActionError::Codec(e.into()))?;

        self.send(
            ".handle_quick_operation",
            json!({ "context": context, "operation": { "reply": text } }),
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Message APIs
    // =========================================================================

    /// Sends a private message; returns the new message ID.
    pub async fn send_private_msg(&self, user_id: i64, message: &str) -> ActionResult<i64> {
        info!(plugin = %self.namespace, user_id, "Private message sent");
        let response = self
            .send(
                "send_private_msg",
                json!({ "user_id": user_id, "message": message }),
            )
            .await?;
        Ok(data::<MessageIdData>(response)?.message_id)
    }

    /// Sends a group message; returns the new message ID.
    pub async fn send_group_msg(&self, group_id: i64, message: &str) -> ActionResult<i64> {
        info!(plugin = %self.namespace, group_id, "Group message sent");
        let response = self
            .send(
                "send_group_msg",
                json!({ "group_id": group_id, "message": message }),
            )
            .await?;
        Ok(data::<MessageIdData>(response)?.message_id)
    }

    /// Sends a message to either a user or a group.
    pub async fn send_msg(&self, target: MessageTarget, message: &str) -> ActionResult<i64> {
        match target {
            MessageTarget::Private(user_id) => self.send_private_msg(user_id, message).await,
            MessageTarget::Group(group_id) => self.send_group_msg(group_id, message).await,
        }
    }

    /// Recalls a message.
    pub async fn delete_msg(&self, message_id: i64) -> ActionResult<()> {
        self.send("delete_msg", json!({ "message_id": message_id }))
            .await?;
        Ok(())
    }

    /// Fetches a stored message.
    pub async fn get_msg(&self, message_id: i64) -> ActionResult<MessageInfo> {
        let response = self.send("get_msg", json!({ "message_id": message_id })).await?;
        data(response)
    }

    // =========================================================================
    // Account and info APIs
    // =========================================================================

    /// Information about the logged-in account.
    pub async fn get_login_info(&self) -> ActionResult<LoginInfo> {
        data(self.send("get_login_info", json!({})).await?)
    }

    /// Information about an arbitrary user.
    pub async fn get_stranger_info(&self, user_id: i64, no_cache: bool) -> ActionResult<StrangerInfo> {
        data(
            self.send(
                "get_stranger_info",
                json!({ "user_id": user_id, "no_cache": no_cache }),
            )
            .await?,
        )
    }

    /// Information about a group.
    pub async fn get_group_info(&self, group_id: i64, no_cache: bool) -> ActionResult<GroupInfo> {
        data(
            self.send(
                "get_group_info",
                json!({ "group_id": group_id, "no_cache": no_cache }),
            )
            .await?,
        )
    }

    /// Information about one group member.
    pub async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
        no_cache: bool,
    ) -> ActionResult<GroupMemberInfo> {
        data(
            self.send(
                "get_group_member_info",
                json!({ "group_id": group_id, "user_id": user_id, "no_cache": no_cache }),
            )
            .await?,
        )
    }

    // =========================================================================
    // Moderation and handling APIs
    // =========================================================================

    /// Mutes a group member for `duration` seconds (0 unmutes).
    pub async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: i64) -> ActionResult<()> {
        self.send(
            "set_group_ban",
            json!({ "group_id": group_id, "user_id": user_id, "duration": duration }),
        )
        .await?;
        Ok(())
    }

    /// Removes a member from a group.
    pub async fn set_group_kick(
        &self,
        group_id: i64,
        user_id: i64,
        reject_add_request: bool,
    ) -> ActionResult<()> {
        self.send(
            "set_group_kick",
            json!({
                "group_id": group_id,
                "user_id": user_id,
                "reject_add_request": reject_add_request
            }),
        )
        .await?;
        Ok(())
    }

    /// Approves or rejects a friend request.
    pub async fn set_friend_add_request(
        &self,
        flag: &str,
        approve: bool,
        remark: Option<&str>,
    ) -> ActionResult<()> {
        self.send(
            "set_friend_add_request",
            json!({ "flag": flag, "approve": approve, "remark": remark }),
        )
        .await?;
        Ok(())
    }

    /// Approves or rejects a group join request or invite.
    pub async fn set_group_add_request(
        &self,
        flag: &str,
        sub_type: &str,
        approve: bool,
        reason: Option<&str>,
    ) -> ActionResult<()> {
        self.send(
            "set_group_add_request",
            json!({ "flag": flag, "sub_type": sub_type, "approve": approve, "reason": reason }),
        )
        .await?;
        Ok(())
    }
}

/// Destination of [`Api::send_msg`].
#[derive(Debug, Clone, Copy)]
pub enum MessageTarget {
    /// Direct message to a user.
    Private(i64),
    /// Message to a group.
    Group(i64),
}

fn data<T: DeserializeOwned>(response: ActionResponse) -> ActionResult<T> {
    serde_json::from_value(response.data).map_err(|e| ActionError::Codec(e.into()))
}

// =============================================================================
// Typed return payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct MessageIdData {
    message_id: i64,
}

/// Logged-in account information.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    /// Account ID.
    pub user_id: i64,
    /// Account nickname.
    pub nickname: String,
}

/// Arbitrary-user information.
#[derive(Debug, Clone, Deserialize)]
pub struct StrangerInfo {
    /// User ID.
    pub user_id: i64,
    /// Nickname.
    pub nickname: String,
    /// Gender ("male", "female", "unknown").
    #[serde(default)]
    pub sex: String,
    /// Age.
    #[serde(default)]
    pub age: i64,
}

/// Group information.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupInfo {
    /// Group ID.
    pub group_id: i64,
    /// Group name.
    pub group_name: String,
    /// Current member count.
    #[serde(default)]
    pub member_count: i64,
    /// Maximum member count.
    #[serde(default)]
    pub max_member_count: i64,
}

/// Group member information.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberInfo {
    /// Group ID.
    pub group_id: i64,
    /// User ID.
    pub user_id: i64,
    /// Nickname.
    pub nickname: String,
    /// Group card.
    #[serde(default)]
    pub card: String,
    /// Role in the group ("owner", "admin", "member").
    #[serde(default)]
    pub role: String,
    /// Join timestamp.
    #[serde(default)]
    pub join_time: i64,
}

/// A stored message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageInfo {
    /// Message ID.
    pub message_id: i64,
    /// Send timestamp.
    #[serde(default)]
    pub time: i64,
    /// Message content segments.
    #[serde(default)]
    pub message: Value,
    /// Raw message string.
    #[serde(default)]
    pub raw_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{EventDispatcher, HandlerSet};
    use beacon_core::{CallError, EventName, NullAdaptor};

    fn api_with(dispatcher: Arc<EventDispatcher>) -> Api {
        Api::new(
            "test.caller",
            Arc::new(NullAdaptor::new()),
            dispatcher,
            Weak::new(),
        )
    }

    #[tokio::test]
    async fn send_through_null_adaptor_fails_fast() {
        let api = api_with(Arc::new(EventDispatcher::new()));
        assert!(matches!(
            api.send("get_status", json!({})).await,
            Err(ActionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn call_resolves_through_the_dispatcher() {
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher.register(
            "test.callee",
            HandlerSet::new().on(EventName::Call, |event| async move {
                if let Event::Call(call) = &*event {
                    call.resolve(json!({ "echo": call.params.clone() }));
                }
                Ok(())
            }),
        );

        let api = api_with(Arc::clone(&dispatcher));
        let result = api
            .call(Some("test.callee"), "ping", json!({ "n": 1 }))
            .await
            .unwrap();
        assert_eq!(result["echo"]["n"], 1);
    }

    #[tokio::test]
    async fn call_to_missing_target_is_rejected() {
        let api = api_with(Arc::new(EventDispatcher::new()));
        assert!(matches!(
            api.call(Some("nobody"), "ping", Value::Null).await,
            Err(CallError::NoSuchTarget(_))
        ));
    }

    #[tokio::test]
    async fn metas_without_manager_are_empty() {
        let api = api_with(Arc::new(EventDispatcher::new()));
        assert!(api.plugin_metas().await.is_empty());
    }
}
