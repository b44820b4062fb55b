pub mod encoders;
pub mod sink;

pub use encoders::create_encoder;
pub use encoders::MetricsEncoder;
pub use sink::SharedSink;
pub use sink::Sink;
