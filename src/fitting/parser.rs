//! Plain-text fit parser (spec.md §4.8): the canonical export format used by
//! the game's in-client "copy as EFT" action.
//!
//! ```text
//! [Rifter, Tackler]
//!
//! Nanofiber Internal Structure I
//! 200mm AutoCannon II, Republic Fleet EMP S
//! Warp Scrambler II
//!
//! 5x Warrior I
//! ```
//!
//! Header line `[ShipType, FitName]`; blank lines separate fitting slots;
//! each module line is optionally suffixed by a comma-separated charge or
//! the literal `/offline`; a trailing quantity section uses `ItemName xN`.
//! Unknown items are skipped with a warning; an unknown ship type fails the
//! whole parse (spec.md §4.8).

use crate::error::ToolError;

#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub name: String,
    pub charge: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Clone)]
pub struct ParsedDrone {
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct ParsedFit {
    pub ship_type: String,
    pub fit_name: String,
    pub modules: Vec<ParsedModule>,
    pub drones: Vec<ParsedDrone>,
    pub warnings: Vec<String>,
}

fn parse_header(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    let mut parts = inner.splitn(2, ',');
    let ship = parts.next()?.trim().to_string();
    let fit_name = parts.next().unwrap_or("").trim().to_string();
    if ship.is_empty() {
        None
    } else {
        Some((ship, fit_name))
    }
}

fn parse_module_line(line: &str) -> ParsedModule {
    let (body, offline) = match line.strip_suffix("/OFFLINE") {
        Some(rest) => (rest.trim(), true),
        None => (line, false),
    };
    let mut parts = body.splitn(2, ',');
    let name = parts.next().unwrap_or("").trim().to_string();
    let charge = parts.next().map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    ParsedModule { name, charge, offline }
}

fn parse_drone_line(line: &str) -> Option<ParsedDrone> {
    let tokens: Vec<&str> = line.rsplitn(2, ' ').collect();
    if tokens.len() != 2 {
        return None;
    }
    let qty_token = tokens[0];
    let name = tokens[1];
    let stripped = qty_token.strip_prefix(['x', 'X'])?;
    let quantity: u32 = stripped.parse().ok()?;
    Some(ParsedDrone {
        name: name.trim().to_string(),
        quantity,
    })
}

/// `known_item` resolves a (case-insensitive) item or ship name; the parser
/// is pure text structure and leaves identity resolution to the caller
/// (spec.md §4.8 — item names resolved case-insensitively; unknown items
/// are skipped with a warning, an unknown ship type fails the whole parse).
pub fn parse_fit(text: &str, known_item: impl Fn(&str) -> bool) -> Result<ParsedFit, ToolError> {
    let mut lines = text.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| ToolError::invalid_parameter("fit_text", "empty fit text"))?
        .trim();
    let (ship_type, fit_name) = parse_header(header_line)
        .ok_or_else(|| ToolError::invalid_parameter("fit_text", "missing `[ShipType, FitName]` header line"))?;
    if !known_item(&ship_type) {
        return Err(ToolError::type_not_found(&ship_type, Vec::new()));
    }

    let mut modules = Vec::new();
    let mut drones = Vec::new();
    let mut warnings = Vec::new();

    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(drone) = parse_drone_line(line) {
            if known_item(&drone.name) {
                drones.push(drone);
            } else {
                warnings.push(format!("skipped unknown drone `{}`", drone.name));
            }
            continue;
        }

        let module = parse_module_line(line);
        if module.name.is_empty() {
            continue;
        }
        if !known_item(&module.name) {
            warnings.push(format!("skipped unknown module `{}`", module.name));
            continue;
        }
        if let Some(charge) = &module.charge {
            if !known_item(charge) {
                warnings.push(format!("skipped unknown charge `{charge}` on `{}`", module.name));
                modules.push(ParsedModule {
                    name: module.name,
                    charge: None,
                    offline: module.offline,
                });
                continue;
            }
        }
        modules.push(module);
    }

    Ok(ParsedFit {
        ship_type,
        fit_name,
        modules,
        drones,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_known(_: &str) -> bool {
        true
    }

    #[test]
    fn parses_header_and_modules() {
        let text = "[Rifter, Tackler]\n\nNanofiber Internal Structure I\n200mm AutoCannon II, Republic Fleet EMP S\nWarp Scrambler II\n\n5x Warrior I\n";
        let fit = parse_fit(text, always_known).unwrap();
        assert_eq!(fit.ship_type, "Rifter");
        assert_eq!(fit.fit_name, "Tackler");
        assert_eq!(fit.modules.len(), 3);
        assert_eq!(fit.modules[1].charge.as_deref(), Some("Republic Fleet EMP S"));
        assert_eq!(fit.drones.len(), 1);
        assert_eq!(fit.drones[0].quantity, 5);
    }

    #[test]
    fn unknown_ship_type_fails_whole_parse() {
        let text = "[Nonexistent Hull, Fit]\n\nSome Module\n";
        let err = parse_fit(text, |_| false).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeNotFound);
    }

    #[test]
    fn unknown_module_is_skipped_with_warning() {
        let known = |name: &str| name != "Ghost Module";
        let text = "[Rifter, Tackler]\n\nGhost Module\nWarp Scrambler II\n";
        let fit = parse_fit(text, known).unwrap();
        assert_eq!(fit.modules.len(), 1);
        assert_eq!(fit.warnings.len(), 1);
    }

    #[test]
    fn offline_suffix_is_recognized() {
        let text = "[Rifter, Tackler]\n\nWarp Scrambler II/OFFLINE\n";
        let fit = parse_fit(text, always_known).unwrap();
        assert!(fit.modules[0].offline);
    }
}
