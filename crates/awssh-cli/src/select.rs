//! Interactive selection of targets and profiles
//!
//! The candidates are printed as a numbered table and the user answers with
//! a row number or a search term. Search ignores case and whitespace and
//! matches against every field of a candidate.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use awssh_core::{ControlPlaneError, SessionError, Target};

use crate::output::{format_profiles, format_targets};

/// Outcome of matching one answer against the candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Selected(usize),
    NoMatch,
    Ambiguous(Vec<usize>),
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Match `input` against candidates, each described by its searchable fields
pub fn choose<S: AsRef<str>>(input: &str, candidates: &[Vec<S>]) -> Choice {
    let input = input.trim();

    if let Ok(number) = input.parse::<usize>() {
        if (1..=candidates.len()).contains(&number) {
            return Choice::Selected(number - 1);
        }
    }

    let needle = normalize(input);
    if needle.is_empty() {
        return Choice::NoMatch;
    }

    let matches: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, fields)| {
            fields
                .iter()
                .any(|field| normalize(field.as_ref()).contains(&needle))
        })
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Choice::NoMatch,
        [only] => Choice::Selected(*only),
        _ => {
            // An exact hit wins over partial ones.
            let exact: Vec<usize> = matches
                .iter()
                .copied()
                .filter(|i| {
                    candidates[*i]
                        .iter()
                        .any(|field| normalize(field.as_ref()) == needle)
                })
                .collect();
            match exact.as_slice() {
                [only] => Choice::Selected(*only),
                _ => Choice::Ambiguous(matches),
            }
        }
    }
}

/// Prompt until one candidate is chosen
///
/// Returns an error when input ends before a choice is made.
pub fn prompt<R, W, S>(
    reader: &mut R,
    writer: &mut W,
    label: &str,
    candidates: &[Vec<S>],
) -> Result<usize>
where
    R: BufRead,
    W: Write,
    S: AsRef<str>,
{
    loop {
        write!(writer, "{} (number or search): ", label)?;
        writer.flush()?;

        let mut input = String::new();
        let read = reader
            .read_line(&mut input)
            .context("Failed to read selection")?;
        if read == 0 {
            anyhow::bail!("Selection aborted");
        }

        match choose(&input, candidates) {
            Choice::Selected(index) => return Ok(index),
            Choice::NoMatch => writeln!(writer, "No match for '{}'", input.trim())?,
            Choice::Ambiguous(matches) => {
                let numbers: Vec<String> = matches.iter().map(|i| (i + 1).to_string()).collect();
                writeln!(writer, "Ambiguous, matches rows {}", numbers.join(", "))?;
            }
        }
    }
}

/// Pick a target interactively from `targets`
pub fn select_target(targets: &[Target]) -> Result<Target> {
    if targets.is_empty() {
        return Err(SessionError::Resolution(ControlPlaneError::NotFound(
            "No running instance".to_string(),
        ))
        .into());
    }

    let candidates: Vec<Vec<&str>> = targets
        .iter()
        .map(|t| {
            let mut fields = vec![t.id.as_str()];
            fields.extend(t.name.as_deref());
            fields
        })
        .collect();

    let mut stderr = io::stderr();
    writeln!(stderr, "{}", format_targets(targets))?;
    let index = prompt(&mut io::stdin().lock(), &mut stderr, "Instance", &candidates)?;
    Ok(targets[index].clone())
}

/// Pick an AWS profile interactively
pub fn select_profile(profiles: &[String]) -> Result<String> {
    if profiles.is_empty() {
        anyhow::bail!("No profiles with role_arn found");
    }

    let candidates: Vec<Vec<&str>> = profiles.iter().map(|p| vec![p.as_str()]).collect();

    let mut stderr = io::stderr();
    writeln!(stderr, "{}", format_profiles(profiles))?;
    let index = prompt(&mut io::stdin().lock(), &mut stderr, "Profile", &candidates)?;
    Ok(profiles[index].clone())
}
