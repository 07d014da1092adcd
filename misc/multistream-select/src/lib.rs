//! Sans-I/O multistream-select: a line-oriented protocol negotiation scheme.
//! Both [`Client`] and [`Listener`] are pure state machines driven by
//! `on_data`; neither performs any I/O.

mod client;
mod error;
mod line;
mod server;

pub use client::{Client, ClientProgress};
pub use error::Error;
pub use server::{Listener, ListenerProgress, ListenerStatus};

pub(crate) const HEADER: &str = "/multistream/1.0.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_server_negotiate_second_proposal() {
        let (mut client, client_out) =
            Client::new(vec!["/foo/1".to_string(), "/bar/1".to_string()]).unwrap();
        let mut server = Listener::new(vec!["/bar/1".to_string()]);

        let progress = server.on_data(&client_out).unwrap();
        // header ack + na for /foo/1
        assert_eq!(progress.outbound.len(), 2);
        assert_eq!(progress.status, ListenerStatus::InProgress);

        let mut server_out = Vec::new();
        for frame in &progress.outbound {
            server_out.extend_from_slice(frame);
        }

        let client_progress = client.on_data(&server_out).unwrap();
        let retry_bytes = match client_progress {
            super::ClientProgress::SendNextProposal(bytes) => bytes,
            other => panic!("expected SendNextProposal, got {other:?}"),
        };

        let progress2 = server.on_data(&retry_bytes).unwrap();
        assert_eq!(
            progress2.status,
            ListenerStatus::Selected {
                protocol: "/bar/1".to_string(),
                leftover: vec![]
            }
        );
        let mut server_out2 = Vec::new();
        for frame in &progress2.outbound {
            server_out2.extend_from_slice(frame);
        }

        let final_progress = client.on_data(&server_out2).unwrap();
        assert_eq!(
            final_progress,
            super::ClientProgress::Selected {
                protocol: "/bar/1".to_string(),
                leftover: vec![]
            }
        );
    }

    #[test]
    fn leftover_application_bytes_survive_negotiation() {
        let (mut client, client_out) = Client::new(vec!["/only/1".to_string()]).unwrap();
        let mut server = Listener::new(vec!["/only/1".to_string()]);

        let progress = server.on_data(&client_out).unwrap();
        let mut server_out = Vec::new();
        for frame in &progress.outbound {
            server_out.extend_from_slice(frame);
        }
        server_out.extend_from_slice(b"app-bytes");

        let client_progress = client.on_data(&server_out).unwrap();
        assert_eq!(
            client_progress,
            super::ClientProgress::Selected {
                protocol: "/only/1".to_string(),
                leftover: b"app-bytes".to_vec()
            }
        );
    }

    #[test]
    fn unsupported_when_all_proposals_rejected() {
        let (mut client, client_out) = Client::new(vec!["/foo/1".to_string()]).unwrap();
        let mut server = Listener::new(vec!["/bar/1".to_string()]);
        let progress = server.on_data(&client_out).unwrap();
        let mut server_out = Vec::new();
        for frame in &progress.outbound {
            server_out.extend_from_slice(frame);
        }
        assert_eq!(
            client.on_data(&server_out).unwrap(),
            super::ClientProgress::Unsupported
        );
    }
}
