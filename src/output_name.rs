use std::path::Path;

const MAX_WORD_CHARS: usize = 50;
const UNNAMED: &str = "unnamed";

/// Builds `[<prefix>-]<template-stem>-<first-word>[-<postfix>].<ext>`.
///
/// The first word of `text` is cut at whitespace, `,` or `;`, capped at 50
/// characters and stripped of characters that are not allowed in file names.
/// Blank prefixes and postfixes are left out.
pub fn output_file_name(
    template: &Path,
    text: &str,
    prefix: Option<&str>,
    postfix: Option<&str>,
    extension: &str,
) -> String {
    let mut name = String::new();
    if let Some(prefix) = prefix.filter(|p| !p.trim().is_empty()) {
        name.push_str(prefix);
        name.push('-');
    }
    name.push_str(&template_stem(template));
    name.push('-');
    name.push_str(&sanitize(&first_word(text)));
    if let Some(postfix) = postfix.filter(|p| !p.trim().is_empty()) {
        name.push('-');
        name.push_str(postfix);
    }
    name.push('.');
    name.push_str(&extension.to_lowercase());
    name
}

/// File name without its last extension; dotfiles keep their leading dot.
fn template_stem(template: &Path) -> String {
    let file_name = template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name[..dot].to_string(),
        _ => file_name,
    }
}

fn first_word(text: &str) -> String {
    let word = text
        .split(|ch: char| ch.is_whitespace() || ch == ',' || ch == ';')
        .find(|part| !part.is_empty());
    match word {
        Some(word) => word.chars().take(MAX_WORD_CHARS).collect(),
        None => UNNAMED.to_string(),
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}
