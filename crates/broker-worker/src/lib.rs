//! AMQP broker worker: one consumer per active contributor, supervised per
//! connector type, cooperatively reconfigured by racing the next delivery
//! against a reload-interval ticker rather than polling in a busy loop.

pub mod consumer;
pub mod publisher;
pub mod reconfigure;
pub mod supervisor;
pub mod worker;

pub use consumer::{BrokerConsumer, ConnectError};
pub use publisher::{AmqpPublisher, RetryingPublisher};
pub use reconfigure::{reconfigure_action, ReconfigureAction};
pub use supervisor::{run_supervisor, SupervisorRef};
pub use worker::{run_worker, WorkerExit};
