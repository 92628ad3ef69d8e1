#![no_main]

//! Fuzz target for binding and resolution
//!
//! Drives arbitrary sequences of binds, resolutions and argument sets over a
//! small class catalog. Every call must return, never panic or overflow the
//! stack, including on self-referencing bindings.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use service_container::{Args, ClassDef, Container, DiError, Param, Properties};

const NAMES: [&str; 4] = ["Logger", "Mailer", "Cache", "Loop"];

#[derive(Default)]
struct Logger {
    level: String,
}

struct Mailer;

#[derive(Debug, Arbitrary)]
enum Arg {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Arbitrary)]
enum ContainerOp {
    Bind { name: u8, class: u8, singleton: bool },
    BindConfig { name: u8, level: String },
    Make { name: u8, fresh: bool },
    MakePositional { name: u8, args: Vec<Arg> },
    MakeNamed { name: u8, args: Vec<(String, Arg)> },
    Override { name: u8, key: String, value: String },
    Forget { name: u8 },
    Unbind { name: u8 },
    Reset,
}

fn name(index: u8) -> &'static str {
    NAMES[index as usize % NAMES.len()]
}

fn value(arg: Arg) -> service_container::Value {
    match arg {
        Arg::Text(text) => text.into(),
        Arg::Flag(flag) => flag.into(),
    }
}

fn catalog() -> Container {
    let container = Container::new();
    container.register_class(
        ClassDef::without_constructor::<Logger>("Logger")
            .property("level", |l: &mut Logger, level: String| l.level = level),
    );
    container.register_class(ClassDef::new::<Mailer, _>(
        "Mailer",
        [Param::service("logger", "Logger"), Param::new("hostName")],
        |args| {
            args.value(0)?;
            args.cloned::<String>(1)?;
            Ok(Mailer)
        },
    ));
    container.register_class(ClassDef::interface("Cache"));
    container.register_class(ClassDef::new::<Mailer, _>(
        "Loop",
        [Param::service("next", "Loop")],
        |_| Ok(Mailer),
    ));
    container
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let container = catalog();

    for op in ops {
        let result = match op {
            ContainerOp::Bind { name: n, class, singleton } => {
                container.bind_with(name(n), name(class), Args::none(), singleton);
                Ok(())
            }
            ContainerOp::BindConfig { name: n, level } => {
                container.bind(
                    name(n),
                    Properties::new().with("class", "Logger").with("level", level),
                );
                Ok(())
            }
            ContainerOp::Make { name: n, fresh } => container
                .make_with(name(n), Args::none(), Properties::new(), fresh)
                .map(drop),
            ContainerOp::MakePositional { name: n, args } => container
                .make_with(
                    name(n),
                    Args::positional(args.into_iter().map(value)),
                    Properties::new(),
                    false,
                )
                .map(drop),
            ContainerOp::MakeNamed { name: n, args } => container
                .make_with(
                    name(n),
                    Args::named(args.into_iter().map(|(k, v)| (k, value(v)))),
                    Properties::new(),
                    false,
                )
                .map(drop),
            ContainerOp::Override { name: n, key, value } => container
                .make_with(name(n), Args::none(), Properties::new().with(key, value), true)
                .map(drop),
            ContainerOp::Forget { name: n } => {
                container.forget_instance(name(n));
                Ok(())
            }
            ContainerOp::Unbind { name: n } => {
                container.unbind(name(n));
                Ok(())
            }
            ContainerOp::Reset => {
                container.reset();
                Ok(())
            }
        };

        if let Err(DiError::CircularDependency { path }) = &result {
            assert!(path.len() >= 2);
            assert_eq!(path.first(), path.last());
        }
    }
});
