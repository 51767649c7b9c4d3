// src/bin/lazyview.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs,
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    path::{Path, PathBuf},
    process::Command,
    thread,
};

use lazycomictrans::html::html_escape;

/// Malý statický HTTP server pro prohlížení vygenerovaných stránek
/// (index.html, per-page HTML, JSON artefakty, obrázky).
#[derive(Parser, Debug)]
struct Args {
    /// Port, na kterém bude server poslouchat
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Kořenový adresář se statickými soubory. Pokud není zadán,
    /// vezme se `./output`, a pokud neexistuje, aktuální adresář.
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let root_dir = resolve_root_dir(args.root.as_deref())?;
    println!("lazyview: sloužím soubory z: {}", root_dir.display());

    let url = format!("http://localhost:{}/", args.port);
    println!("Otevři v prohlížeči: {url}");

    // Zkusíme automaticky otevřít prohlížeč (na pozadí, chyby ignorujeme)
    open_in_browser(&url);

    // Běžíme jen na localhostu
    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .with_context(|| format!("Nelze bindnout port {}", args.port))?;

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let root = root_dir.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &root) {
                        eprintln!("Chyba při obsluze spojení: {e}");
                    }
                });
            }
            Err(e) => eprintln!("Chyba při accept(): {e}"),
        }
    }

    Ok(())
}

/// Určí kořenový adresář serveru.
///
/// Priorita:
/// 1) `--root <cesta>`
/// 2) `./output`, pokud existuje
/// 3) aktuální adresář
fn resolve_root_dir(root_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = root_arg {
        if !p.is_dir() {
            anyhow::bail!("Zadaný root `{}` není adresář nebo neexistuje", p.display());
        }
        return Ok(p.to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("output");
    if candidate.is_dir() {
        Ok(candidate)
    } else {
        Ok(cwd)
    }
}

fn handle_client(mut stream: TcpStream, root_dir: &Path) -> Result<()> {
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);
    let first_line = match request.lines().next() {
        Some(l) => l,
        None => return Ok(()),
    };

    // Očekáváme něco jako: GET /cesta HTTP/1.1
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");

    if method != "GET" {
        return write_response(
            &mut stream,
            405,
            "Method Not Allowed",
            "text/plain; charset=utf-8",
            b"Only GET is supported",
        );
    }

    // Jednoduchá ochrana proti .. v cestě
    if path.contains("..") {
        return write_response(
            &mut stream,
            400,
            "Bad Request",
            "text/plain; charset=utf-8",
            b"Invalid path",
        );
    }

    if path == "/favicon.ico" {
        return write_response(
            &mut stream,
            404,
            "Not Found",
            "text/plain; charset=utf-8",
            b"Not found",
        );
    }

    // Kořen: vygenerovaný index.html, a když chybí (např. přerušený
    // běh), náhradní výpis stránek
    if path == "/" {
        let index_html = root_dir.join("index.html");
        if index_html.is_file() {
            return serve_file(&mut stream, &index_html);
        }
        return serve_fallback_index(&mut stream, root_dir);
    }

    let rel_path = &path[1..];
    let rel_for_fs = rel_path.replace('/', &std::path::MAIN_SEPARATOR.to_string());
    let fs_path = root_dir.join(rel_for_fs);

    if fs_path.is_dir() {
        let index_html = fs_path.join("index.html");
        if index_html.is_file() {
            return serve_file(&mut stream, &index_html);
        }
        return serve_dir_listing(&mut stream, &fs_path, path);
    }

    if fs_path.is_file() {
        return serve_file(&mut stream, &fs_path);
    }

    write_response(
        &mut stream,
        404,
        "Not Found",
        "text/plain; charset=utf-8",
        b"File not found",
    )
}

/// Náhradní homepage, když ve výstupním adresáři chybí index.html:
/// seznam vyrenderovaných stránek (*.html).
fn serve_fallback_index(stream: &mut TcpStream, root_dir: &Path) -> Result<()> {
    let mut html = String::new();

    html.push_str(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>lazyview – přeložené stránky</title>
  <style>
    body {
      margin: 0;
      padding: 16px;
      background: radial-gradient(circle at top, #202542 0, #050611 55%);
      color: #f5f7ff;
      font-family: system-ui, -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
      min-height: 100vh;
    }
    h1 { font-size: 18px; margin: 0 0 12px 0; }
    ul { list-style: none; padding: 0; margin: 0; max-width: 720px; }
    li { margin-bottom: 6px; }
    a {
      display: block;
      padding: 10px 12px;
      border-radius: 8px;
      background: rgba(22,24,36,0.9);
      border: 1px solid rgba(79,195,247,0.3);
      color: #f5f7ff;
      text-decoration: none;
      font-size: 13px;
    }
    a:hover { background: rgba(79,195,247,0.2); }
    .empty {
      font-size: 13px;
      color: #9ca3af;
      padding: 12px;
      border: 1px dashed #2a2f40;
      border-radius: 8px;
      max-width: 720px;
    }
  </style>
</head>
<body>
<h1>Přeložené stránky</h1>
"#,
    );

    let mut names: Vec<String> = Vec::new();
    if let Ok(entries) = fs::read_dir(root_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".html") && name != "index.html" {
                names.push(name);
            }
        }
    }
    names.sort();

    if names.is_empty() {
        html.push_str(
            r#"<div class="empty">
  Žádné vyrenderované stránky. Spusť nejdřív <code>lazycomictrans</code>
  nad adresářem s komiksem, nebo nasměruj server pomocí <code>--root</code>.
</div>"#,
        );
    } else {
        html.push_str("<ul>");
        for name in names {
            html.push_str("<li><a href=\"/");
            html.push_str(&html_escape(&name));
            html.push_str("\">");
            html.push_str(&html_escape(&name));
            html.push_str("</a></li>");
        }
        html.push_str("</ul>");
    }

    html.push_str("</body>\n</html>");

    write_response(stream, 200, "OK", "text/html; charset=utf-8", html.as_bytes())
}

fn serve_dir_listing(stream: &mut TcpStream, dir: &Path, url_path: &str) -> Result<()> {
    let mut html = String::new();
    html.push_str(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
  <meta charset="utf-8">
  <title>Index</title>
  <style>
    body {
      margin: 0;
      padding: 12px 16px;
      background: radial-gradient(circle at top, #202542 0, #050611 55%);
      color: #f5f7ff;
      font-family: system-ui, -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
    }
    h1 { font-size: 18px; margin: 0 0 10px 0; }
    ul { list-style: none; padding: 0; margin: 0; }
    li { margin-bottom: 4px; }
    a {
      color: #4fc3f7;
      text-decoration: none;
      padding: 4px 8px;
      border-radius: 6px;
      display: inline-block;
      background: rgba(22,24,36,0.9);
      border: 1px solid #2a2f40;
      font-size: 13px;
    }
    a:hover { background: rgba(79,195,247,0.16); }
  </style>
</head>
<body>"#,
    );

    html.push_str("<h1>Index ");
    html.push_str(&html_escape(url_path));
    html.push_str("</h1><ul>");

    if let Ok(entries) = fs::read_dir(dir) {
        let mut names: Vec<String> = Vec::new();
        for entry in entries.flatten() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();

        for name in names {
            html.push_str("<li><a href=\"");
            if url_path.ends_with('/') {
                html.push_str(url_path);
                html.push_str(&name);
            } else {
                html.push_str(url_path);
                html.push('/');
                html.push_str(&name);
            }
            html.push_str("\">");
            html.push_str(&html_escape(&name));
            html.push_str("</a></li>");
        }
    }

    html.push_str("</ul></body></html>");

    write_response(stream, 200, "OK", "text/html; charset=utf-8", html.as_bytes())
}

fn serve_file(stream: &mut TcpStream, path: &Path) -> Result<()> {
    let data = fs::read(path)?;
    let mime = guess_mime(path);

    write_response(stream, 200, "OK", &mime, &data)
}

fn write_response(
    stream: &mut TcpStream,
    status_code: u16,
    status_text: &str,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let mut headers = Vec::new();
    headers.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", status_code, status_text).as_bytes());
    headers.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    headers.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    headers.extend_from_slice(b"Connection: close\r\n");
    headers.extend_from_slice(b"\r\n");

    stream.write_all(&headers)?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

fn guess_mime(path: &Path) -> String {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" | "htm" => "text/html; charset=utf-8".to_string(),
        "css" => "text/css; charset=utf-8".to_string(),
        "js" => "text/javascript; charset=utf-8".to_string(),
        "json" => "application/json; charset=utf-8".to_string(),
        "txt" => "text/plain; charset=utf-8".to_string(),
        "webp" => "image/webp".to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

/// Otevře URL v defaultním prohlížeči (best-effort, chyby se ignorují).
fn open_in_browser(url: &str) {
    #[cfg(target_os = "windows")]
    {
        let _ = Command::new("cmd").args(["/C", "start", "", url]).spawn();
    }

    #[cfg(target_os = "macos")]
    {
        let _ = Command::new("open").arg(url).spawn();
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let _ = Command::new("xdg-open").arg(url).spawn();
    }
}
