// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default [`Parser`] implementation.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use super::{Error, Parser, Result};
use crate::{
    model::{
        Background, Examples, PreconditionRef, Scenario, Step, Table,
    },
    tag::Tag,
    Feature,
};

/// Name of the tag turning a [`Scenario`] into a loop.
pub const LOOP_TAG: &str = "loop";

/// Name of the tag importing [`Step`]s of another [`Scenario`].
pub const PRECONDITION_TAG: &str = "precondition";

/// Default [`Parser`].
///
/// Accepts either a single `.feature` file or a directory, which is walked
/// recursively for `*.feature` files in lexicographic order.
///
/// As there is no async runtime-agnostic way to interact with io, this
/// [`Parser`] is blocking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic;

impl Basic {
    /// Resolves the `.feature` files to parse from the given `path`.
    ///
    /// # Errors
    ///
    /// If the `path` doesn't exist or can't be walked.
    pub fn discover(self, path: &Path) -> Result<Vec<PathBuf>> {
        let path = path.canonicalize().map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        if path.is_file() {
            return Ok(vec![path]);
        }

        let walker = globwalk::GlobWalkerBuilder::new(&path, "*.feature")
            .case_insensitive(true)
            .build()
            .map_err(|source| Error::Walk { path: path.clone(), source })?;
        let mut files = walker
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path().to_path_buf())
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

impl<I: AsRef<Path>> Parser<I> for Basic {
    fn parse(self, input: I) -> Result<Vec<Feature>> {
        let mut loader = Loader::default();
        self.discover(input.as_ref())?
            .iter()
            .map(|path| loader.feature(path))
            .collect()
    }
}

/// Converter of [`gherkin`] trees into [`Feature`]s, caching raw files
/// referenced by `@precondition` tags.
#[derive(Debug, Default)]
struct Loader {
    /// Already parsed files.
    cache: HashMap<PathBuf, Rc<gherkin::Feature>>,

    /// `<path>:<scenario>` chain of the preconditions being resolved.
    chain: Vec<String>,
}

impl Loader {
    /// Parses the file at `path`, once.
    fn raw(&mut self, path: &Path) -> Result<Rc<gherkin::Feature>> {
        if let Some(feature) = self.cache.get(path) {
            return Ok(Rc::clone(feature));
        }
        tracing::debug!(path = %path.display(), "parsing feature file");
        let env = gherkin::GherkinEnv::default();
        let feature = Rc::new(gherkin::Feature::parse_path(path, env)?);
        drop(self.cache.insert(path.to_owned(), Rc::clone(&feature)));
        Ok(feature)
    }

    /// Parses and converts the file at `path`.
    fn feature(&mut self, path: &Path) -> Result<Feature> {
        let raw = self.raw(path)?;

        let mut builder =
            Feature::builder(raw.keyword.trim(), raw.name.trim())
                .description(description(raw.description.as_deref()))
                .path(path)
                .line(raw.position.line)
                .tags(tags(&raw.tags));
        if let Some(bg) = &raw.background {
            builder = builder.background(background(bg));
        }
        for scenario in &raw.scenarios {
            builder = builder.scenario(self.scenario(path, scenario)?);
        }
        for rule in &raw.rules {
            let scenarios = rule
                .scenarios
                .iter()
                .map(|s| self.scenario(path, s))
                .collect::<Result<Vec<_>>>()?;
            let bg = rule.background.as_ref().map(background);
            builder = builder.rule(
                rule.name.trim(),
                &tags(&rule.tags),
                bg.as_ref(),
                scenarios,
            );
        }
        Ok(builder.build())
    }

    /// Converts a single `raw` scenario of the file at `path`.
    fn scenario(
        &mut self,
        path: &Path,
        raw: &gherkin::Scenario,
    ) -> Result<Scenario> {
        let tags = tags(&raw.tags);
        let name = raw.name.trim();

        self.chain.push(link(path, name));
        let imported = self.preconditions(path, name, &tags);
        _ = self.chain.pop();

        let scenario = Scenario::new(raw.keyword.trim(), name)
            .with_description(description(raw.description.as_deref()))
            .at_line(raw.position.line)
            .with_tags(tags.iter().cloned())
            .with_steps(imported?)
            .with_steps(raw.steps.iter().map(step));

        if !raw.examples.is_empty() {
            let examples = raw.examples.iter().filter_map(examples).collect();
            return scenario.outline(examples).map_err(|source| {
                Error::ExampleExpansion { path: path.to_owned(), source }
            });
        }

        match tags.iter().find(|t| t.name == LOOP_TAG) {
            None => Ok(scenario),
            Some(tag) => {
                let arg = tag.arg.as_deref().unwrap_or_default();
                arg.parse::<usize>()
                    .map(|n| scenario.looped(n))
                    .map_err(|_| Error::InvalidLoop {
                        arg: arg.to_owned(),
                        scenario: name.to_owned(),
                    })
            }
        }
    }

    /// Collects [`Step`]s imported by the `@precondition` `tags` of the
    /// scenario `name` in the file at `path`.
    fn preconditions(
        &mut self,
        path: &Path,
        name: &str,
        tags: &[Tag],
    ) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        for tag in tags.iter().filter(|t| t.name == PRECONDITION_TAG) {
            let arg = tag.arg.as_deref().unwrap_or_default();
            let (file, reference) = arg
                .split_once(':')
                .map(|(f, r)| (f.trim(), r.trim()))
                .filter(|(f, r)| !f.is_empty() && !r.is_empty())
                .ok_or_else(|| Error::MalformedPrecondition {
                    arg: arg.to_owned(),
                    scenario: name.to_owned(),
                })?;

            let target =
                path.parent().unwrap_or_else(|| Path::new(".")).join(file);
            let target = target
                .canonicalize()
                .map_err(|source| Error::Io { path: target.clone(), source })?;
            steps.extend(self.import(&target, reference)?);
        }
        Ok(steps)
    }

    /// Imports the [`Step`]s of the scenario `reference`d in the file at
    /// `path`, following its own preconditions first.
    fn import(&mut self, path: &Path, reference: &str) -> Result<Vec<Step>> {
        let raw = self.raw(path)?;
        let all = raw
            .scenarios
            .iter()
            .chain(raw.rules.iter().flat_map(|r| &r.scenarios))
            .collect::<Vec<_>>();
        let found = reference
            .parse::<usize>()
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| all.get(i).copied())
            .or_else(|| {
                all.iter().copied().find(|s| {
                    let name = s.name.trim();
                    name == reference || name.replace(' ', "_") == reference
                })
            })
            .ok_or_else(|| Error::PreconditionNotFound {
                reference: reference.to_owned(),
                path: path.to_owned(),
            })?;
        let name = found.name.trim();

        let current = link(path, name);
        if self.chain.contains(&current) {
            let mut chain = self.chain.clone();
            chain.push(current);
            return Err(Error::PreconditionCycle { chain });
        }

        self.chain.push(current);
        let nested = self.preconditions(path, name, &tags(&found.tags));
        _ = self.chain.pop();

        let origin = PreconditionRef {
            path: Some(path.to_owned()),
            scenario: name.to_owned(),
        };
        let mut steps = nested?;
        steps.extend(found.steps.iter().map(|s| {
            let mut imported = step(s);
            imported.as_precondition = Some(origin.clone());
            imported
        }));
        Ok(steps)
    }
}

/// Identifies a scenario in a precondition chain.
fn link(path: &Path, scenario: &str) -> String {
    format!("{}:{scenario}", path.display())
}

/// Splits a raw description into trimmed non-empty lines.
fn description(raw: Option<&str>) -> Vec<String> {
    raw.into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Converts raw tags.
fn tags(raw: &[String]) -> Vec<Tag> {
    raw.iter().map(|t| Tag::parse(t)).collect()
}

/// Converts a raw [`gherkin::Step`].
fn step(raw: &gherkin::Step) -> Step {
    let mut step =
        Step::new(raw.ty.into(), raw.keyword.trim(), raw.value.trim())
            .at_line(raw.position.line);
    step.doc_string = raw.docstring.clone();
    step.table =
        raw.table.as_ref().and_then(|t| Table::from_rows(t.rows.clone()));
    step
}

/// Converts a raw [`gherkin::Background`].
fn background(raw: &gherkin::Background) -> Background {
    Background {
        keyword: raw.keyword.trim().to_owned(),
        name: raw.name.trim().to_owned(),
        steps: raw.steps.iter().map(step).collect(),
    }
}

/// Converts raw [`gherkin::Examples`], skipping ones without a table.
fn examples(raw: &gherkin::Examples) -> Option<Examples> {
    let (header, rows) = raw.table.as_ref()?.rows.split_first()?;
    Some(Examples {
        header: header.clone(),
        rows: rows.to_vec(),
        tags: tags(&raw.tags),
        line: raw.position.line,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::model::{Origin, ScenarioKind};

    const EATING: &str = "\
@food
Feature: Eating
  Background:
    Given a table

  Scenario: plain
    When I eat 3 cucumbers

  Scenario Outline: eating <eat>
    Given there are <start> cucumbers
    When I eat <eat> cucumbers

    @fast
    Examples:
      | start | eat |
      | 12    | 5   |
      | 20    | 4   |

  @loop(3)
  Scenario: spin
    Given a wheel

  Rule: portions
    Scenario: ruled
      Then I am full
";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn discovers_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        _ = write(&nested, "b.feature", "Feature: B\n");
        _ = write(dir.path(), "a.feature", "Feature: A\n");
        _ = write(dir.path(), "notes.txt", "not a feature");

        let features = Basic.parse(dir.path()).unwrap();

        let names =
            features.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn converts_full_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "eating.feature", EATING);

        let features = Basic.parse(&path).unwrap();
        let f = &features[0];

        assert_eq!(f.name, "Eating");
        assert_eq!(f.tags, [Tag::new("food")]);
        assert_eq!(f.scenarios.len(), 4);
        assert_eq!(f.count_scenarios(), 7);
        for s in f.concrete_scenarios() {
            assert_eq!(s.steps[0].text, "a table");
            assert!(s.all_tags.contains(&Tag::new("food")));
        }

        let outline = &f.scenarios[1];
        assert!(matches!(outline.kind, ScenarioKind::Outline { .. }));
        assert_eq!(outline.children()[0].name, "eating 5");
        assert_eq!(
            outline.children()[1].steps[1].text,
            "there are 20 cucumbers",
        );
        assert!(outline.children()[0].tags.contains(&Tag::new("fast")));

        let looped = &f.scenarios[2];
        assert_eq!(looped.children().len(), 3);
        assert!(matches!(
            looped.children()[1].origin,
            Origin::Iteration { index: 2, .. },
        ));

        assert_eq!(f.scenarios[3].rule.as_deref(), Some("portions"));
    }

    #[test]
    fn rejects_invalid_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "loop.feature",
            "Feature: L\n  @loop(many)\n  Scenario: s\n    Given x\n",
        );

        let err = Basic.parse(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidLoop { arg, .. } if arg == "many"));
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "outline.feature",
            "Feature: O\n  Scenario Outline: s\n    Given <missing>\n\n    \
             Examples:\n      | a |\n      | 1 |\n",
        );

        let err = Basic.parse(&path).unwrap_err();
        assert!(
            matches!(err, Error::ExampleExpansion { .. } | Error::Parsing(_)),
            "{err}",
        );
    }

    #[test]
    fn imports_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        _ = write(
            dir.path(),
            "base.feature",
            "Feature: Base\n  Scenario: logged in user\n    Given a user\n    \
             When they log in\n",
        );
        let main = write(
            dir.path(),
            "main.feature",
            "Feature: Main\n  @precondition(base.feature:logged_in_user)\n  \
             Scenario: browse\n    Then they see the shop\n\n  \
             @precondition(base.feature:1)\n  Scenario: by index\n    \
             Then it works\n",
        );

        let features = Basic.parse(&main).unwrap();

        for s in &features[0].scenarios {
            let texts =
                s.steps.iter().map(|s| s.text.as_str()).collect::<Vec<_>>();
            assert_eq!(texts[..2], ["a user", "they log in"]);
            let imported = s.steps[0].as_precondition.as_ref();
            assert_eq!(
                imported.map(|p| p.scenario.as_str()),
                Some("logged in user"),
            );
            assert!(s.steps[2].as_precondition.is_none());
        }
    }

    #[test]
    fn detects_precondition_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.feature",
            "Feature: A\n  @precondition(b.feature:1)\n  Scenario: a\n    \
             Given x\n",
        );
        _ = write(
            dir.path(),
            "b.feature",
            "Feature: B\n  @precondition(a.feature:a)\n  Scenario: b\n    \
             Given y\n",
        );

        let err = Basic.parse(&a).unwrap_err();
        let Error::PreconditionCycle { chain } = err else {
            panic!("expected a cycle, got: {err}");
        };
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.first(), chain.last());
    }

    #[test]
    fn reports_missing_precondition() {
        let dir = tempfile::tempdir().unwrap();
        _ = write(dir.path(), "base.feature", "Feature: Base\n");
        let main = write(
            dir.path(),
            "main.feature",
            "Feature: Main\n  @precondition(base.feature:nope)\n  \
             Scenario: s\n    Given x\n",
        );

        let err = Basic.parse(&main).unwrap_err();
        assert!(matches!(
            err,
            Error::PreconditionNotFound { reference, .. }
                if reference == "nope",
        ));
    }
}
