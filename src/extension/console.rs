// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Console`] extension rendering progress of a run.

use std::{
    borrow::Cow,
    cell::RefCell,
    collections::HashMap,
    io::{self, Write as _},
    rc::Rc,
    str::FromStr,
};

use console::{Style, Term};
use derive_more::with_trait::Debug;
use itertools::Itertools as _;

use super::{Descriptor, ExtOption, Extension};
use crate::{
    error::ConfigError,
    hook::{Hook, HookHandle, HookTarget, Phase, Point},
    id::ScenarioId,
    model::{Feature, Origin, Scenario, ScenarioKind, State, Step},
    Config, HookRegistry, RunContext,
};

/// [`Style`]s for terminal output.
#[derive(Clone, Debug)]
pub struct Styles {
    /// [`Style`] for rendering passed nodes.
    pub ok: Style,

    /// [`Style`] for rendering skipped and untested nodes.
    pub skipped: Style,

    /// [`Style`] for rendering pending nodes.
    pub pending: Style,

    /// [`Style`] for rendering errors and failed nodes.
    pub err: Style,

    /// [`Style`] for rendering headers.
    pub header: Style,

    /// [`Style`] for rendering __bold__.
    pub bold: Style,

    /// Indicates whether the output is a colored terminal.
    pub is_present: bool,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            ok: Style::new().green(),
            skipped: Style::new().cyan(),
            pending: Style::new().yellow(),
            err: Style::new().red(),
            header: Style::new().blue(),
            bold: Style::new().bold(),
            is_present: Term::stdout().is_term() && console::colors_enabled(),
        }
    }
}

impl Styles {
    /// Creates new [`Styles`], coloring only a detected terminal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates new [`Styles`] never coloring anything.
    #[must_use]
    pub fn plain() -> Self {
        Self { is_present: false, ..Self::default() }
    }

    /// If terminal is present colors `input` according to the `state` or
    /// leaves "as is" otherwise.
    #[must_use]
    pub fn paint<'a>(
        &self,
        state: State,
        input: impl Into<Cow<'a, str>>,
    ) -> Cow<'a, str> {
        let style = match state {
            State::Passed => &self.ok,
            State::Failed => &self.err,
            State::Pending => &self.pending,
            State::Skipped | State::Untested => &self.skipped,
        };
        self.apply(style, input)
    }

    /// If terminal is present colors `input` with [`Styles::err`] color or
    /// leaves "as is" otherwise.
    #[must_use]
    pub fn err<'a>(&self, input: impl Into<Cow<'a, str>>) -> Cow<'a, str> {
        self.apply(&self.err, input)
    }

    /// If terminal is present colors `input` with [`Styles::header`] color or
    /// leaves "as is" otherwise.
    #[must_use]
    pub fn header<'a>(&self, input: impl Into<Cow<'a, str>>) -> Cow<'a, str> {
        self.apply(&self.header, input)
    }

    /// If terminal is present makes `input` __bold__ or leaves "as is"
    /// otherwise.
    #[must_use]
    pub fn bold<'a>(&self, input: impl Into<Cow<'a, str>>) -> Cow<'a, str> {
        self.apply(&self.bold, input)
    }

    /// Applies the `style` if terminal is present.
    fn apply<'a>(
        &self,
        style: &Style,
        input: impl Into<Cow<'a, str>>,
    ) -> Cow<'a, str> {
        if self.is_present {
            style.apply_to(input.into()).to_string().into()
        } else {
            input.into()
        }
    }
}

/// Shared in-memory output, readable after the run.
#[derive(Clone, Debug, Default)]
pub struct Buffer(Rc<RefCell<Vec<u8>>>);

impl Buffer {
    /// Creates a new empty [`Buffer`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output format of the [`Console`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Formatter {
    /// Every [`Scenario`] with its [`Step`]s, as written in `.feature` files.
    #[default]
    Gherkin,

    /// Single character per [`Step`].
    Dots,
}

impl FromStr for Formatter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gherkin" | "pretty" => Ok(Self::Gherkin),
            "dots" | "progress" => Ok(Self::Dots),
            _ => Err(ConfigError::InvalidOptionValue {
                name: "formatter".into(),
                value: s.into(),
                reason: "possible values: gherkin, dots".into(),
            }),
        }
    }
}

/// Layout of an outline's `Examples` table.
#[derive(Clone, Debug)]
struct Outline {
    /// Title line of the outline.
    title: String,

    /// Printable width of every column.
    widths: Vec<usize>,

    /// `Examples` header printed last, if the title is printed already.
    header: Option<Vec<String>>,
}

/// Rendering state shared by the [`Console`] hooks.
#[derive(Debug)]
struct Printer {
    /// Where to write.
    #[debug(skip)]
    out: Box<dyn io::Write>,

    /// [`Styles`] to color with.
    styles: Styles,

    /// [`Formatter`] to render with.
    formatter: Formatter,

    /// Layouts of the outlines of the current [`Feature`].
    outlines: HashMap<ScenarioId, Outline>,
}

impl Printer {
    /// Renders the start of a [`Feature`].
    fn feature_started(&mut self, feature: &Feature) -> io::Result<()> {
        self.outlines = feature
            .scenarios
            .iter()
            .filter(|s| matches!(s.kind, ScenarioKind::Outline { .. }))
            .map(|s| {
                let columns =
                    s.children().first().map_or(0, |c| match &c.origin {
                        Origin::Example { row, .. } => row.header.len(),
                        _ => 0,
                    });
                let outline = Outline {
                    title: format!("{}: {}", s.keyword, s.name),
                    widths: (0..columns).map(|i| s.column_width(i)).collect(),
                    header: None,
                };
                (s.id, outline)
            })
            .collect();

        let title = format!("{}: {}", feature.keyword, feature.name);
        match self.formatter {
            Formatter::Gherkin => {
                writeln!(self.out, "{}", self.styles.bold(title))
            }
            Formatter::Dots => {
                write!(self.out, "{} ", self.styles.bold(title))
            }
        }
    }

    /// Renders a finished [`Scenario`].
    fn scenario_finished(&mut self, scenario: &Scenario) -> io::Result<()> {
        if self.formatter == Formatter::Dots {
            let dots = scenario.steps.iter().map(|s| {
                let c = match s.state {
                    State::Passed => ".",
                    State::Failed => "F",
                    State::Skipped => "-",
                    State::Pending => "P",
                    State::Untested => "U",
                };
                self.styles.paint(s.state, c)
            });
            return write!(self.out, "{}", dots.format(""));
        }

        let outline = match &scenario.origin {
            Origin::Example { template, row } => {
                self.outlines.get_mut(template).map(|o| (o, row))
            }
            Origin::Standalone | Origin::Iteration { .. } => None,
        };
        if let Some((outline, row)) = outline {
            // Rows may be filtered out or shuffled, so the title goes with
            // the first row run, and the header whenever it changes.
            if outline.header.is_none() {
                writeln!(self.out, "  {}", outline.title)?;
            }
            if outline.header.as_ref() != Some(&row.header) {
                let header = table_row(&row.header, &outline.widths);
                writeln!(self.out, "      {}", self.styles.header(header))?;
                outline.header = Some(row.header.clone());
            }
            let line = table_row(&row.values, &outline.widths);
            let line = self.styles.paint(scenario.state, line);
            writeln!(self.out, "      {line}")?;
            for step in scenario.steps.iter().filter(|s| s.state.is_failed()) {
                self.step(step)?;
            }
            return Ok(());
        }

        let title = format!("{}: {}", scenario.keyword, scenario.name);
        writeln!(self.out, "  {}", self.styles.paint(scenario.state, title))?;
        for step in &scenario.steps {
            self.step(step)?;
        }
        Ok(())
    }

    /// Renders a single [`Step`].
    fn step(&mut self, step: &Step) -> io::Result<()> {
        let (glyph, note) = match step.state {
            State::Passed => ("\u{2714}", ""),
            State::Failed => ("\u{2718}", ""),
            State::Skipped => ("-", " (skipped)"),
            State::Pending => ("?", " (pending)"),
            State::Untested => ("\u{b7}", ""),
        };
        let line = format!("{glyph}  {} {}{note}", step.keyword, step.text);
        writeln!(self.out, "    {}", self.styles.paint(step.state, line))?;
        if let Some(failure) = &step.failure {
            let reason = format!("Step failed: {failure}");
            writeln!(self.out, "       {}", self.styles.err(reason))?;
        }
        Ok(())
    }

    /// Renders the end of a [`Feature`].
    fn feature_finished(&mut self) -> io::Result<()> {
        self.outlines.clear();
        writeln!(self.out)
    }
}

/// Renders cells of a table row aligned to the given `widths`.
fn table_row(cells: &[String], widths: &[usize]) -> String {
    let cells = cells.iter().enumerate().map(|(i, cell)| {
        let pad = widths
            .get(i)
            .copied()
            .unwrap_or_default()
            .saturating_sub(console::measure_text_width(cell));
        format!(" {cell}{} ", " ".repeat(pad))
    });
    format!("|{}|", cells.format("|"))
}

/// Extension rendering [`Feature`]s, [`Scenario`]s and [`Step`]s as they
/// finish.
#[derive(Debug)]
pub struct Console {
    /// [`Formatter`] in use.
    formatter: Formatter,

    /// Registered [`Hook`]s.
    handles: Vec<HookHandle>,
}

impl Console {
    /// Creates a [`Descriptor`] of a [`Console`] writing into the given
    /// `out`put without colors.
    #[must_use]
    pub fn writing_to<W>(out: W) -> Descriptor
    where
        W: io::Write + Clone + 'static,
    {
        Descriptor::of::<Self>().with_factory(move |ctx, hooks| {
            Self::install(ctx, hooks, Box::new(out.clone()), false)
        })
    }

    /// Returns the [`Formatter`] in use.
    #[must_use]
    pub const fn formatter(&self) -> Formatter {
        self.formatter
    }

    /// Returns handles of the registered [`Hook`]s.
    #[must_use]
    pub fn handles(&self) -> &[HookHandle] {
        &self.handles
    }

    /// Registers the rendering [`Hook`]s.
    fn install(
        ctx: &mut RunContext,
        hooks: &mut HookRegistry,
        out: Box<dyn io::Write>,
        is_term: bool,
    ) -> anyhow::Result<Self> {
        let config = ctx.config();
        let formatter = config
            .value("formatter")
            .unwrap_or_default()
            .map(str::parse::<Formatter>)
            .transpose()?
            .unwrap_or_default();
        let no_ansi = config.flag("no-ansi").unwrap_or_default();

        let mut styles = Styles::new();
        styles.is_present &= is_term && !no_ansi;

        let printer = Rc::new(RefCell::new(Printer {
            out,
            styles,
            formatter,
            outlines: HashMap::new(),
        }));
        let named = |suffix: &str| format!("console::{suffix}");

        let p = Rc::clone(&printer);
        let started = hooks.before(
            Point::EachFeature,
            Hook::new(move |_: &mut RunContext, target: HookTarget<'_>| {
                match target {
                    HookTarget::Feature(f) => p.borrow_mut().feature_started(f),
                    _ => Ok(()),
                }
            })
            .named(named("feature_started")),
        );

        let p = Rc::clone(&printer);
        let scenario = hooks.after(
            Point::EachScenario,
            Hook::new(move |_: &mut RunContext, target: HookTarget<'_>| {
                match target {
                    HookTarget::Scenario(s) => {
                        p.borrow_mut().scenario_finished(s)
                    }
                    _ => Ok(()),
                }
            })
            .named(named("scenario_finished")),
        );

        let p = Rc::clone(&printer);
        let finished = hooks.after(
            Point::EachFeature,
            Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
                p.borrow_mut().feature_finished()
            })
            .named(named("feature_finished")),
        );

        let flushed = hooks.register(
            Phase::After,
            Point::All,
            Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
                printer.borrow_mut().out.flush()
            })
            .named(named("flush")),
        );

        Ok(Self {
            formatter,
            handles: vec![started, scenario, finished, flushed],
        })
    }
}

impl Extension for Console {
    const NAME: &'static str = "console";

    fn options() -> Vec<ExtOption> {
        vec![
            ExtOption::flag("no-output", "Disables console output"),
            ExtOption::flag("no-ansi", "Disables colored console output"),
            ExtOption::value(
                "formatter",
                "gherkin|dots",
                "Console output format [default: gherkin]",
            )
            .short('f'),
        ]
    }

    fn load_if(config: &Config) -> bool {
        !config.flag("no-output").unwrap_or_default()
    }

    fn load(
        ctx: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self> {
        let is_term = Term::stdout().is_term();
        Self::install(ctx, hooks, Box::new(io::stdout()), is_term)
    }
}
