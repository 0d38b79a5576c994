use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use objwire_transport::{Socket, TcpAcceptor};
use tracing::debug;

use crate::channel::Channel;
use crate::config::{ChannelConfig, Ownership};
use crate::error::Result;
use crate::handler::HandlerContext;

/// Connect to a listening peer over TCP.
pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Channel> {
    connect_with_config(addr, ChannelConfig::default())
}

/// Connect with explicit channel configuration.
pub fn connect_with_config(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    config: ChannelConfig,
) -> Result<Channel> {
    let socket = objwire_transport::connect(addr)?;
    socket.set_nodelay(true)?;
    Channel::with_config(socket, Ownership::Owned, config)
}

/// Connect, giving up after `timeout` per resolved address.
pub fn connect_timeout(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    timeout: Duration,
    config: ChannelConfig,
) -> Result<Channel> {
    let socket = objwire_transport::connect_timeout(addr, timeout)?;
    socket.set_nodelay(true)?;
    Channel::with_config(socket, Ownership::Owned, config)
}

/// Accepts TCP connections and wraps each in a [`Channel`].
pub struct ChannelListener {
    acceptor: TcpAcceptor,
    config: ChannelConfig,
}

impl ChannelListener {
    /// Bind and listen on the given address.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        Ok(Self {
            acceptor: TcpAcceptor::bind(addr)?,
            config: ChannelConfig::default(),
        })
    }

    /// Override the configuration used for accepted channels.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Channel> {
        let socket = self.acceptor.accept()?;
        socket.set_nodelay(true)?;
        Channel::with_config(socket, Ownership::Owned, self.config.clone())
    }

    /// Accept the next connection and start `worker` as its command handler.
    pub fn accept_with_handler(
        &self,
        worker: impl FnOnce(HandlerContext) + Send + 'static,
    ) -> Result<Channel> {
        let socket = self.acceptor.accept()?;
        self.serve(socket, worker)
    }

    /// Like [`ChannelListener::accept_with_handler`], but gives up after
    /// `wait` and returns `Ok(None)`. `worker` is dropped unused in that case.
    pub fn accept_with_handler_timeout(
        &self,
        wait: Duration,
        worker: impl FnOnce(HandlerContext) + Send + 'static,
    ) -> Result<Option<Channel>> {
        match self.acceptor.accept_timeout(wait)? {
            Some(socket) => self.serve(socket, worker).map(Some),
            None => Ok(None),
        }
    }

    fn serve(
        &self,
        socket: Socket,
        worker: impl FnOnce(HandlerContext) + Send + 'static,
    ) -> Result<Channel> {
        socket.set_nodelay(true)?;
        let channel = Channel::builder(socket)
            .config(self.config.clone())
            .handler(worker)
            .build()?;
        channel.start_handler()?;
        debug!(peer = %channel.peer(), "accepted channel with handler");
        Ok(channel)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }
}
