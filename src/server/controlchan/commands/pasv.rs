//! The RFC 959 Passive (`PASV`) command.
//
// This command requests that the server listen on a data port and wait for a
// connection rather than initiate one upon receipt of a transfer command.
// The reply carries the IPv4 address and port the server is listening on.

use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::{DataIntent, PassiveSocket},
};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug)]
pub struct Pasv;

#[async_trait]
impl CommandHandler for Pasv {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        // The address we advertise: the NAT override if configured, else the
        // address the client connected to.
        let advertised: Ipv4Addr = match (args.passive_host, args.local_addr.ip()) {
            (Some(nat_ip), _) => nat_ip,
            (None, IpAddr::V4(ip)) => ip,
            (None, IpAddr::V6(_)) => {
                return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "PASV needs IPv4; use EPSV"));
            }
        };

        let (listener, lease) = match args.port_allocator.acquire(args.local_addr.ip()) {
            Some(bound) => bound,
            None => return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Out of passive ports")),
        };
        let port = lease.port();

        // A fresh PASV discards whatever intent came before it.
        args.session.lock().await.data_intent = Some(DataIntent::Passive(PassiveSocket { listener, lease }));

        let octets = advertised.octets();
        let (p1, p2) = (port >> 8, port & 0xff);
        Ok(Reply::new_with_string(
            ReplyCode::EnteringPassiveMode,
            format!(
                "Entering Passive Mode ({},{},{},{},{},{})",
                octets[0], octets[1], octets[2], octets[3], p1, p2
            ),
        ))
    }
}
