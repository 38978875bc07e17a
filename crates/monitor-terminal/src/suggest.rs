//! Completion candidates for partially typed input.
//!
//! Every candidate is the whole input line with the word being typed
//! completed, so a line editor can replace its buffer with it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use monitor_types::member::ObjectRef;

use crate::interpreter::Monitor;
use crate::variables::GLOBAL_SCOPE;

impl Monitor {
    /// Sorted, deduplicated completions of `text`.
    pub fn suggest(&self, text: &str) -> Vec<String> {
        let command = last_command(text);
        let head = &text[..text.len() - command.len()];
        let words = split_words(text);
        let trailing = text.ends_with(' ');
        let last = if trailing { "" } else { words.last().map_or("", String::as_str) };

        let all_but_last = joined(&words[..words.len().saturating_sub(1)]);
        let before_argument = if trailing { joined(&words) } else { all_but_last.clone() };

        let mut suggestions = Vec::new();
        if let Some(path) = last.strip_prefix('@') {
            suggestions.extend(self.suggest_paths(&all_but_last, path));
        } else if let Some(name) = last.strip_prefix('$') {
            suggestions.extend(self.suggest_variables(name).map(|v| format!("{all_but_last}${v}")));
        }

        let command_words: Vec<&str> = command.split(' ').collect();
        if command.contains(' ') {
            if let [first, rest @ ..] = command_words.as_slice()
                && rest.len() <= 1
            {
                let argument = rest.first().copied().unwrap_or_default();
                if let Some(cmd) = self.commands.get(first) {
                    suggestions.extend(
                        cmd.suggestions(argument, self)
                            .into_iter()
                            .map(|s| format!("{before_argument}{s}")),
                    );
                } else if !rest.is_empty() {
                    let argument = argument.to_lowercase();
                    suggestions.extend(
                        self.device_member_names(first)
                            .into_iter()
                            .filter(|m| m.to_lowercase().starts_with(&argument))
                            .map(|m| format!("{before_argument}{m}")),
                    );
                }
            }
        } else {
            let mut names = self.commands.names();
            names.extend(self.resolver().available_names());
            if let Some(host) = &self.script_host {
                names.extend(host.builtin_names());
            }
            suggestions.extend(
                names
                    .into_iter()
                    .filter(|n| n.starts_with(command))
                    .map(|n| format!("{head}{n}")),
            );

            if suggestions.is_empty() {
                let typed = command.to_lowercase();
                let manager = Arc::clone(&self.manager) as ObjectRef;
                suggestions.extend(
                    self.member_names_of(&manager)
                        .into_iter()
                        .filter(|m| m.to_lowercase().starts_with(&typed)),
                );
            }
        }

        suggestions.sort();
        suggestions.dedup();
        suggestions
    }

    fn member_names_of(&self, object: &ObjectRef) -> Vec<String> {
        let mut names = self
            .types
            .type_of(&**object)
            .map(|info| info.member_names())
            .unwrap_or_default();
        names.extend(self.types.extensions_of(&**object).iter().map(|m| m.name.clone()));
        names
    }

    fn device_member_names(&self, name: &str) -> Vec<String> {
        match self.resolver().resolve(name) {
            Ok(target) => self.member_names_of(&target.object),
            Err(_) => Vec::new(),
        }
    }

    fn suggest_variables(&self, typed: &str) -> impl Iterator<Item = String> {
        let scope = match self.current_machine() {
            Some(machine) => format!("{}.", machine.scope_name()),
            None => format!("{GLOBAL_SCOPE}."),
        };
        let names: Vec<&str> = self
            .session
            .variables
            .names()
            .chain(self.session.macros.names())
            .collect();

        let exact = names
            .iter()
            .filter(|n| n.starts_with(typed))
            .map(|n| n.to_string());
        let scoped = names
            .iter()
            .filter_map(|n| n.strip_prefix(scope.as_str()))
            .filter(|n| n.starts_with(typed))
            .map(str::to_string);
        exact.chain(scoped).collect::<Vec<_>>().into_iter()
    }

    fn suggest_paths(&self, before: &str, typed: &str) -> Vec<String> {
        let typed = typed.replace("\\ ", " ");
        let (directory, file) = match typed.rfind('/') {
            Some(index) => (&typed[..=index], &typed[index + 1..]),
            None => ("", typed.as_str()),
        };

        let roots: Vec<PathBuf> = if typed.starts_with('/') {
            vec![PathBuf::from(directory)]
        } else {
            self.monitor_path
                .entries()
                .iter()
                .filter(|entry| entry.is_dir())
                .map(|entry| entry.join(directory))
                .collect()
        };

        let mut found = Vec::new();
        for root in roots {
            for (name, is_dir) in list_directory(&root, file) {
                let mut completed = format!("{directory}{name}");
                if is_dir {
                    completed.push('/');
                }
                found.push(format!("{before}@{}", completed.replace(' ', "\\ ")));
            }
        }
        found
    }
}

/// Entries of `directory` whose names start with `prefix`.
fn list_directory(directory: &Path, prefix: &str) -> Vec<(String, bool)> {
    let Ok(entries) = std::fs::read_dir(directory) else {
        log::debug!("cannot list {}", directory.display());
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            name.starts_with(prefix).then_some((name, is_dir))
        })
        .collect()
}

/// The text after the last `;` outside quotes, without leading blanks.
fn last_command(text: &str) -> &str {
    let mut quote = None;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ';') => start = index + 1,
            _ => {}
        }
    }
    text[start..].trim_start()
}

/// Whitespace-separated words, where `\ ` does not separate.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&' ') {
            current.push(c);
            current.push(' ');
            chars.next();
        } else if c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn joined(words: &[String]) -> String {
    if words.is_empty() {
        String::new()
    } else {
        format!("{} ", words.join(" "))
    }
}
