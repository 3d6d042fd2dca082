//! Echo Bot Demo
//!
//! A minimal host with one plugin that echoes messages back and answers
//! plugin calls with a usage counter.
//!
//! Expects a plugin directory next to the working directory:
//!
//! ```text
//! plugins/
//! └── echo/
//!     └── plugin.toml
//! ```
//!
//! with a manifest declaring `namespace = "demo.echo"`, and a `beacon.toml`
//! selecting the gateway connection:
//!
//! ```toml
//! [connection]
//! type = "ws-server"
//! host = "127.0.0.1"
//! port = 6700
//! path = "/beacon"
//! ```
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use beacon::prelude::*;
use serde_json::json;

/// Echo plugin: `/echo <text>` and `/ping` over private and group
/// messages, plus a `stats` method exposed to other plugins.
struct Echo {
    inner: Arc<EchoInner>,
}

struct EchoInner {
    api: Api,
    logger: PluginLogger,
    storage: Storage,
}

impl Echo {
    fn new(ctx: PluginContext) -> Self {
        Self {
            inner: Arc::new(EchoInner {
                api: ctx.api,
                logger: ctx.logger,
                storage: ctx.storage,
            }),
        }
    }
}

impl EchoInner {
    fn served(&self) -> u64 {
        self.storage.get::<u64>("served").ok().flatten().unwrap_or(0)
    }

    async fn answer(&self, event: &MessageEvent, text: &str) -> Result<(), BoxError> {
        let reply = if let Some(content) = text.strip_prefix("/echo ") {
            Some(content.to_string())
        } else if text.trim() == "/ping" {
            Some("Pong!".to_string())
        } else {
            None
        };

        if let Some(reply) = reply {
            if let Err(e) = self.storage.set("served", &(self.served() + 1)) {
                self.logger.warn(format!("cannot persist counter: {e}"));
            }
            self.api.reply(event, &reply).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Echo {
    async fn on_start(&self) -> Result<(), BoxError> {
        self.inner.logger.info("echo plugin ready");
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), BoxError> {
        self.inner.logger.info("echo plugin stopped");
        Ok(())
    }

    fn handlers(&self) -> HandlerSet {
        let on_message = {
            let inner = Arc::clone(&self.inner);
            move |event: Arc<Event>| {
                let inner = Arc::clone(&inner);
                async move {
                    if let Event::Message(message) = &*event {
                        inner.answer(message, message.raw_message()).await?;
                    }
                    Ok(())
                }
            }
        };

        let on_call = {
            let inner = Arc::clone(&self.inner);
            move |event: Arc<Event>| {
                let inner = Arc::clone(&inner);
                async move {
                    if let Event::Call(call) = &*event {
                        match call.method.as_str() {
                            "stats" => call.resolve(json!({ "served": inner.served() })),
                            other => call.reject(CallError::Rejected(format!(
                                "unknown method: {other}"
                            ))),
                        }
                    }
                    Ok(())
                }
            }
        };

        HandlerSet::new()
            .on(EventName::PrivateMessage, on_message.clone())
            .on(EventName::GroupMessage, on_message)
            .on(EventName::Call, on_call)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = BeaconRuntime::new().await?;

    runtime.install_fn("demo.echo", |ctx| {
        Ok(Arc::new(Echo::new(ctx)) as BoxedPlugin)
    });

    runtime.run().await;
    Ok(())
}
