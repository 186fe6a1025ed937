//! WebSocket subscribe route for live order status updates.
//!
//! A client opens `/ws/orders/{order_id}` and receives one
//! `{"order_id": …, "status": "PAID"|"CANCELLED"}` frame per broker delivery
//! for that order. Client frames are ignored; their absence (a dead socket)
//! is caught by the heartbeat. Delivery is best-effort and at-least-once;
//! clients must tolerate duplicates.

use crate::state::AppState;
use crate::websocket::{SubscriberId, SubscriberRegistry};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct StatusFrame(String);

struct WsSession {
    order_id: i64,
    subscriber_id: SubscriberId,
    registry: SubscriberRegistry,
    rx: Option<UnboundedReceiver<String>>,
    hb: Instant,
}

impl WsSession {
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::debug!(order_id = act.order_id, "WebSocket heartbeat timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);

        // Bridge the registry channel into the actor mailbox
        if let Some(mut rx) = self.rx.take() {
            let addr = ctx.address();
            tokio::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    if addr.try_send(StatusFrame(frame)).is_err() {
                        break;
                    }
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let registry = self.registry.clone();
        let order_id = self.order_id;
        let subscriber_id = self.subscriber_id;
        tokio::spawn(async move {
            registry.remove_subscriber(order_id, subscriber_id).await;
        });
    }
}

impl Handler<StatusFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: StatusFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(data)) => {
                self.hb = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // Client frames carry no meaning, but they prove liveness
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(_) => ctx.stop(),
        }
    }
}

#[get("/ws/orders/{order_id}")]
pub async fn ws_orders(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let order_id = path.into_inner();
    let (subscriber_id, rx) = state.registry.add_subscriber(order_id).await;

    let session = WsSession {
        order_id,
        subscriber_id,
        registry: state.registry.clone(),
        rx: Some(rx),
        hb: Instant::now(),
    };

    ws::start(session, &req, stream)
}
