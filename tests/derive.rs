//! `#[derive(Autowire)]` class descriptors.

#![cfg(feature = "derive")]

use service_container::{Args, Autowire, ClassDef, Container, DiError};
use std::sync::Arc;

#[derive(Default)]
struct FileLogger;

#[derive(Autowire)]
#[autowire(name = "Mailer")]
struct SmtpMailer {
    #[inject("Logger")]
    logger: Arc<FileLogger>,
    host: String,
    #[param(default)]
    port: u16,
}

fn container() -> Container {
    let container = Container::new();
    container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
    container.singleton("Logger", "FileLogger");
    container.register_class_of::<SmtpMailer>();
    container
}

#[test]
fn test_derived_descriptor_shape() {
    let class = SmtpMailer::class_def();
    assert_eq!(class.name(), "Mailer");

    let params = class.constructor_params().unwrap();
    assert_eq!(params.len(), 3);
    assert_eq!(params[0].service_type(), Some("Logger"));
    assert!(params[1].default_value().is_none());
    assert!(params[2].default_value().is_some());
}

#[test]
fn test_derived_class_autowires() {
    let container = container();

    let mailer = container
        .get_with::<SmtpMailer>("Mailer", Args::positional(["smtp.local"]))
        .unwrap();
    assert_eq!(mailer.host, "smtp.local");
    assert_eq!(mailer.port, 0);
    assert!(Arc::ptr_eq(
        &mailer.logger,
        &container.get::<FileLogger>("Logger").unwrap()
    ));
}

#[test]
fn test_derived_class_reports_missing_field() {
    let container = container();
    assert_eq!(
        container.make("Mailer").unwrap_err(),
        DiError::missing_parameter("host", "Mailer")
    );
}
