//! folio - EPUB inspection and position tooling

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use folio::{Book, Cfi, parse_document, search_chapter};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "EPUB reading engine tools", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio info book.epub                          Show book structure
    folio locate book.epub 'epubcfi(/6/4!/4/2)'   Resolve a position
    folio search book.epub 'white whale'          Scan for text")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show metadata, spine, and table of contents
    Info { input: String },
    /// Resolve a CFI to its chapter and element
    Locate { input: String, cfi: String },
    /// Linear-scan all chapters for a query
    Search { input: String, query: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Info { ref input } => show_info(input, cli.json),
        Command::Locate { ref input, ref cfi } => locate(input, cfi, cli.json),
        Command::Search {
            ref input,
            ref query,
        } => search(input, query, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_info(path: &str, json: bool) -> Result<(), String> {
    let book = Book::open(path).map_err(|e| e.to_string())?;
    let meta = &book.metadata;

    if json {
        let value = serde_json::json!({
            "title": meta.title,
            "creators": meta.creators,
            "language": meta.language,
            "identifier": meta.identifier,
            "chapters": book.spine.iter().map(|item| &item.href).collect::<Vec<_>>(),
            "toc_entries": count_toc(&book.toc),
        });
        println!("{}", serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?);
        return Ok(());
    }

    println!("File: {path}");
    println!("Title: {}", meta.title);
    if !meta.creators.is_empty() {
        println!("Creators: {}", meta.creators.join(", "));
    }
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    if let Some(ref publisher) = meta.publisher {
        println!("Publisher: {publisher}");
    }
    println!("Chapters: {}", book.spine.len());
    for (index, item) in book.spine.iter().enumerate() {
        println!("  [{index}] {} ({})", item.href, item.idref);
    }
    println!("TOC entries: {}", count_toc(&book.toc));
    if !book.guide.is_empty() {
        println!("Guide:");
        for reference in &book.guide {
            println!("  {}: {} -> {}", reference.ref_type, reference.title, reference.href);
        }
    }
    Ok(())
}

fn count_toc(entries: &[folio::TocEntry]) -> usize {
    entries
        .iter()
        .map(|entry| 1 + count_toc(&entry.children))
        .sum()
}

fn locate(path: &str, cfi_str: &str, json: bool) -> Result<(), String> {
    let book = Book::open(path).map_err(|e| e.to_string())?;
    let cfi = Cfi::parse(cfi_str).map_err(|e| e.to_string())?;

    let index = cfi.spine_index();
    let item = book
        .spine
        .get(index)
        .ok_or_else(|| format!("spine index {index} out of range"))?;

    let doc = parse_document(&item.content).map_err(|e| e.to_string())?;
    let node = cfi.resolve(&doc).map_err(|e| e.to_string())?;

    let name = doc.element_name(node).unwrap_or("#root");
    let id = doc.element_id(node);

    if json {
        let value = serde_json::json!({
            "spine_index": index,
            "idref": item.idref,
            "href": item.href,
            "element": name,
            "id": id,
            "offset": cfi.terminal_offset(),
        });
        println!("{}", serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?);
    } else {
        println!("Chapter [{index}]: {} ({})", item.href, item.idref);
        match id {
            Some(id) => println!("Element: <{name} id=\"{id}\">"),
            None => println!("Element: <{name}>"),
        }
        if let Some(offset) = cfi.terminal_offset() {
            println!("Character offset: {offset}");
        }
    }
    Ok(())
}

fn search(path: &str, query: &str, json: bool) -> Result<(), String> {
    let book = Book::open(path).map_err(|e| e.to_string())?;

    let mut total = 0;
    for (index, item) in book.spine.iter().enumerate() {
        let doc = parse_document(&item.content).map_err(|e| e.to_string())?;
        let matches = search_chapter(&doc, index, query).map_err(|e| e.to_string())?;
        for hit in &matches {
            if json {
                let value = serde_json::json!({
                    "href": item.href,
                    "cfi": hit.cfi.to_string(),
                    "excerpt": hit.excerpt,
                });
                println!("{}", serde_json::to_string(&value).map_err(|e| e.to_string())?);
            } else {
                println!("{}  {}", hit.cfi, hit.excerpt.trim());
            }
        }
        total += matches.len();
    }

    if !json {
        println!("{total} match(es)");
    }
    Ok(())
}
