use std::path::PathBuf;

use pdf::TextSpan;

use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Args)]
pub struct ProbeOptions {
    /// PDF file to read
    pub path: PathBuf,

    /// Page index, starting at 0; every page when omitted
    #[arg(short, long)]
    pub page: Option<usize>,

    /// Only spans starting near this point, as X,Y in top-left coordinates
    #[arg(long, value_name = "X,Y")]
    pub near: Option<String>,

    /// Distance in points used by --near
    #[arg(long, default_value = "5")]
    pub radius: f32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(options: ProbeOptions, global: crate::Global) -> Result<()> {
    let bytes = std::fs::read(&options.path)
        .wrap_err_with(|| format!("Failed to read {}", options.path.display()))?;
    let near = options.near.as_deref().map(parse_point).transpose()?;

    let pages = pdf::inspect(&bytes)?;
    if global.verbose {
        for page in &pages {
            eprintln!("page {}: {} x {} pt", page.index, page.width, page.height);
        }
    }

    let indexes: Vec<usize> = match options.page {
        Some(page) => vec![page],
        None => pages.iter().map(|p| p.index).collect(),
    };

    let mut found: Vec<(usize, TextSpan)> = Vec::new();
    for page in indexes {
        let spans = pdf::extract_spans(&bytes, page)?;
        found.extend(
            spans
                .into_iter()
                .filter(|span| near.map_or(true, |point| is_near(span, point, options.radius)))
                .map(|span| (page, span)),
        );
    }

    if options.json {
        let spans: Vec<serde_json::Value> = found
            .iter()
            .map(|(page, span)| serde_json::json!({ "page": page, "span": span }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&spans)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("No text found.");
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Page", "X", "Y", "Size", "Font", "Text"]);
    for (page, span) in &found {
        table.add_row(prettytable::row![
            page,
            format!("{:.1}", span.x),
            format!("{:.1}", span.y),
            format!("{:.1}", span.font_size),
            span.font_name,
            span.text
        ]);
    }
    table.printstd();

    Ok(())
}

/// Parse `"X,Y"`.
pub fn parse_point(text: &str) -> Result<(f32, f32), Error> {
    let invalid = || Error::Point(text.to_string());
    let (x, y) = text.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse().map_err(|_| invalid())?;
    let y = y.trim().parse().map_err(|_| invalid())?;
    Ok((x, y))
}

fn is_near(span: &TextSpan, (x, y): (f32, f32), radius: f32) -> bool {
    (span.x - x).hypot(span.y - y) <= radius
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(x: f32, y: f32) -> TextSpan {
        TextSpan {
            text: "Nguyen Van A".into(),
            x,
            y,
            font_size: 10.0,
            font_name: "Helvetica".into(),
        }
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("100,200").unwrap(), (100.0, 200.0));
        assert_eq!(parse_point(" 12.5 , 7 ").unwrap(), (12.5, 7.0));
        assert!(matches!(parse_point("100"), Err(Error::Point(_))));
        assert!(matches!(parse_point("a,b"), Err(Error::Point(_))));
    }

    #[test]
    fn test_is_near() {
        assert!(is_near(&span(100.0, 200.0), (100.0, 200.0), 0.0));
        assert!(is_near(&span(103.0, 204.0), (100.0, 200.0), 5.0));
        assert!(!is_near(&span(106.0, 200.0), (100.0, 200.0), 5.0));
    }
}
