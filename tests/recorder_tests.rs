mod common;

use common::Client;
use logger_httpd::{CommandDispatch, CommandRequest, QueryParams, Recorder, Server, ServerConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn command(name: &str) -> CommandRequest {
    CommandRequest {
        name: name.to_string(),
        params: QueryParams::default(),
        body: None,
    }
}

#[cfg(test)]
mod recorder_tests {
    use super::*;

    #[test]
    fn test_start_and_stop_report_whether_state_changed() {
        let recorder = Recorder::new();
        assert!(!recorder.is_recording());

        assert!(recorder.on_request(&command("start")).unwrap());
        assert!(recorder.is_recording());
        assert!(!recorder.on_request(&command("start")).unwrap());
        assert!(recorder.is_recording());

        assert!(recorder.on_request(&command("stop")).unwrap());
        assert!(!recorder.is_recording());
        assert!(!recorder.on_request(&command("stop")).unwrap());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_status_command_and_unknown_commands() {
        let recorder = Recorder::new();
        assert!(recorder.on_request(&command("status")).unwrap());
        assert!(recorder.on_request(&command("reboot")).is_err());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_status_text_follows_recording_state() {
        let recorder = Recorder::default();
        assert!(recorder.status().starts_with("Status: STOPPED\nUptime: "));

        recorder.on_request(&command("start")).unwrap();
        let status = recorder.status();
        assert!(status.starts_with("Status: RECORDING\n"), "{}", status);
        assert!(status.ends_with("s\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recorder_driven_over_http() {
        let root = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::new());
        let server = Server::start(ServerConfig::local(root.path()), &recorder)
            .await
            .unwrap();

        let mut client = Client::connect(server.local_addr()).await.unwrap();
        let response = client.post("/start", b"").await.unwrap();
        assert_eq!(response.status_line, "HTTP/1.1 200 OK");
        assert!(recorder.is_recording());

        let response = client.get("/").await.unwrap();
        assert!(response.body_text().starts_with("Status: RECORDING\n"));

        client.post("/stop", b"").await.unwrap();
        assert!(!recorder.is_recording());

        server.stop().await.unwrap();
    }
}
