//! ui-gateway demo server.
//!
//! Serves a small page that opens the Data channel, relays every message a
//! client sends to all other clients and broadcasts a heartbeat once per
//! second.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ui_gateway::config::GatewayConfig;
use ui_gateway::http::HttpResponse;
use ui_gateway::server::{HttpRequestDelegate, WebsocketServer};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>ui-gateway</title></head>
<body>
<p>visits in this session: <b>{{visits}}</b></p>
<pre id="log"></pre>
<input id="msg" placeholder="message"><button id="send">send</button>
<script>
const scheme = location.protocol === "https:" ? "wss" : "ws";
const ws = new WebSocket(scheme + "://" + location.host + "/", "data");
ws.binaryType = "arraybuffer";
const log = document.getElementById("log");
ws.onmessage = (ev) => {
  const text = typeof ev.data === "string" ? ev.data : new TextDecoder().decode(ev.data);
  log.textContent = text + "\n" + log.textContent.slice(0, 4000);
};
document.getElementById("send").onclick = () => ws.send(document.getElementById("msg").value);
</script>
</body>
</html>"#;

fn page_delegate() -> HttpRequestDelegate {
    Box::new(|request, session, client_ip| {
        if request.page() != "/" && request.page() != "/index.html" {
            return None;
        }
        let visits = {
            let mut session = session.write();
            let visits = session.get("visits").and_then(serde_json::Value::as_u64).unwrap_or(0) + 1;
            session.insert("visits", json!(visits));
            visits
        };
        tracing::debug!(%client_ip, visits, "index served");
        Some(HttpResponse::new(
            "text/html",
            INDEX_HTML.replace("{{visits}}", &visits.to_string()),
        ))
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env().context("loading configuration")?;
    tracing::info!(addr = %config.listen_addr(), "starting ui-gateway");

    let mut server =
        WebsocketServer::new(config, Some(page_delegate()), None).context("starting server")?;

    let relay = server.broadcaster();
    server.set_data_receive_delegate(Some(Box::new(move |message, client_ip, sender| {
        tracing::debug!(%client_ip, %sender, len = message.len(), "relaying message");
        let _ = relay.send_to_all_others(message, sender);
    })));
    server.set_client_disconnect_delegate(Some(Box::new(|client| {
        tracing::info!(%client, "client left");
    })));

    let heartbeat = server.broadcaster();
    thread::Builder::new()
        .name("heartbeat".to_string())
        .spawn(move || {
            let mut seq: u64 = 0;
            loop {
                thread::sleep(Duration::from_secs(1));
                seq += 1;
                let beat = json!({
                    "type": "heartbeat",
                    "seq": seq,
                    "time": chrono::Utc::now(),
                });
                let _ = heartbeat.send_to_all(beat.to_string());
            }
        })
        .context("spawning heartbeat thread")?;

    tracing::info!(addr = %server.local_addr(), "serving");
    loop {
        server.step();
    }
}
