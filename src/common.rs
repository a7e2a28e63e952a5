// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the driver modules.
//!
//! The driver never talks to a console directly. Everything it wants to say goes
//! through a [`Logger`], which the integrator picks when building the controller.
//! [`NoOpLogger`] compiles the diagnostics away; [`UartLogger`] formats them onto any
//! `embedded_io::Write` sink such as a debug UART.

use core::fmt;

/// Severity attached to a log record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

/// Sink for driver diagnostics.
///
/// Only [`Logger::log`] is required. The level helpers exist so call sites read like
/// `self.logger.warn(format_args!(...))`.
pub trait Logger {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>);

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn info(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

/// Logger that drops everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline(always)]
    fn log(&mut self, _level: Level, _args: fmt::Arguments<'_>) {}
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        (**self).log(level, args);
    }
}

/// Logger writing `[LEVEL] message\r\n` lines to a byte sink.
///
/// Records above `max_level` are discarded. Write failures are ignored: losing a
/// diagnostic line must never change the outcome of a bus operation.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
    max_level: Level,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W, max_level: Level) -> Self {
        Self { writer, max_level }
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        if level > self.max_level {
            return;
        }
        let _ = write!(self.writer, "[{}] ", level.as_str());
        let _ = self.writer.write_fmt(args);
        let _ = self.writer.write_all(b"\r\n");
    }
}
