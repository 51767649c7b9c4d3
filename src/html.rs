// src/html.rs
use serde_json::json;

use crate::annotate::AnnotatedPanel;
use crate::boxes::Page;

/// Záznam pro index: jedna vyrenderovaná stránka.
pub struct IndexEntry {
    /// Název HTML dokumentu stránky (relativní odkaz).
    pub html_file: String,
    /// Název zdrojového obrázku (popisek odkazu).
    pub image_file: String,
    pub panel_count: usize,
}

/// Interaktivní dokument jedné stránky: obrázek + klikací mapa panelů
/// + vložené anotace. Hit-regiony dostanou jen panely, které prošly
/// filtrem platnosti; pořadí kopíruje čtecí pořadí.
pub fn render_page_html(page: &Page, panels: &[AnnotatedPanel]) -> String {
    let title = html_escape(&page.file_name);
    let img_src = html_escape(&page.file_name);

    // <area> v celočíselných souřadnicích zdrojového obrázku
    let mut areas = String::new();
    for (i, p) in panels.iter().enumerate() {
        let n = i + 1;
        areas.push_str(&format!(
            "    <area shape=\"rect\" coords=\"{}\" href=\"#\" alt=\"panel {n}\" \
             title=\"panel {n}\" data-panel-id=\"{}\">\n",
            area_coords(p),
            html_escape(&p.bx.id),
        ));
    }

    // anotace vložené přímo do dokumentu; stránka je soběstačná
    let translations_json: Vec<_> = panels
        .iter()
        .map(|p| {
            json!({
                "id": p.annotation.id,
                "translation": p.annotation.translation,
                "image": p.annotation.image,
            })
        })
        .collect();
    let translations_js = embed_json(&serde_json::Value::Array(translations_json));

    let nat_w = page.width;
    let nat_h = page.height;
    let count_label = panel_count_label(panels.len());

    let mut html = String::new();

    html.push_str(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>"#,
    );
    html.push_str(&title);
    html.push_str(
        r#" – panely</title>
<style>
  :root {
    color-scheme: dark;
    --bg-panel: #161824;
    --border-soft: #2a2f40;
    --accent: #4fc3f7;
    --text-main: #f5f7ff;
    --text-muted: #9ca3af;
  }

  * { box-sizing: border-box; }

  body {
    margin: 0;
    padding: 0;
    background: radial-gradient(circle at top, #202542 0, #050611 55%);
    color: var(--text-main);
    font-family: system-ui, -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
    min-height: 100vh;
  }

  header {
    padding: 12px 16px;
    border-bottom: 1px solid var(--border-soft);
    background: linear-gradient(90deg, #12141f, #191c2b);
    display: flex;
    align-items: baseline;
    gap: 10px;
  }

  header h1 { font-size: 18px; margin: 0; }
  header .meta { font-size: 13px; color: var(--text-muted); }

  .wrap { max-width: 1200px; margin: 16px auto; padding: 0 12px; }
  .wrap img { width: 100%; height: auto; display: block; border-radius: 8px; }
  area { cursor: pointer; }

  #panel-modal {
    display: none;
    position: fixed;
    top: 50%;
    left: 50%;
    transform: translate(-50%, -50%);
    max-width: min(640px, 90vw);
    max-height: 80vh;
    overflow-y: auto;
    background: var(--bg-panel);
    border: 1px solid var(--border-soft);
    border-radius: 12px;
    padding: 18px 20px;
    z-index: 100;
    box-shadow: 0 12px 40px rgba(0,0,0,0.55);
  }

  #panel-modal p { margin: 0 0 8px 0; line-height: 1.5; }
  #panel-modal code {
    font-family: Consolas, Menlo, Monaco, monospace;
    font-size: 13px;
    background: #0b0c10;
    padding: 1px 4px;
    border-radius: 4px;
  }

  #modal-crop {
    display: none;
    max-width: 100%;
    margin-top: 10px;
    border-radius: 8px;
    border: 1px solid var(--border-soft);
  }

  #panel-modal .hint {
    margin-top: 10px;
    font-size: 11px;
    color: var(--text-muted);
  }

  footer {
    font-size: 11px;
    color: var(--text-muted);
    text-align: center;
    padding: 10px 0 14px;
  }
</style>
</head>
<body>
<header>
  <h1>"#,
    );
    html.push_str(&title);
    html.push_str("</h1>\n  <div class=\"meta\">");
    html.push_str(&count_label);
    html.push_str(" · klikni na panel pro překlad</div>\n</header>\n");

    html.push_str("<div class=\"wrap\">\n  <img id=\"comic-img\" src=\"");
    html.push_str(&img_src);
    html.push_str("\" alt=\"komiksová stránka\" usemap=\"#comic-map\">\n");
    html.push_str("  <map name=\"comic-map\" id=\"comic-map\">\n");
    html.push_str(&areas);
    html.push_str("  </map>\n</div>\n");

    html.push_str(
        r#"<div id="panel-modal">
  <div id="modal-text"></div>
  <img id="modal-crop" alt="výřez panelu">
  <div class="hint">kliknutím kamkoli do okna se zavře</div>
</div>
<footer>lazycomictrans</footer>
"#,
    );

    // klientská logika: přepočet souřadnic na zobrazenou velikost
    // (originál se cachuje v data-orig, opakovaný přepočet se nesčítá),
    // modal s překladem a miniaturní vykreslení lehkého značkování
    html.push_str("<script>\nconst TRANSLATIONS = ");
    html.push_str(&translations_js);
    html.push_str(";\nconst NAT_W = ");
    html.push_str(&nat_w.to_string());
    html.push_str(";\nconst NAT_H = ");
    html.push_str(&nat_h.to_string());
    html.push_str(";\n");
    html.push_str(
        r#"(function() {
  var img = document.getElementById('comic-img');
  var map = document.getElementById('comic-map');
  var modal = document.getElementById('panel-modal');

  function rescaleMap() {
    var natW = img.naturalWidth || NAT_W;
    var natH = img.naturalHeight || NAT_H;
    var curW = img.clientWidth;
    var curH = img.clientHeight;
    if (!natW || !natH || !curW || !curH) return;
    var scaleX = curW / natW;
    var scaleY = curH / natH;
    Array.prototype.forEach.call(map.querySelectorAll('area'), function(a) {
      var orig = a.dataset.orig;
      if (!orig) {
        orig = a.coords;
        a.dataset.orig = orig;
      }
      var pts = orig.split(',').map(Number);
      for (var i = 0; i < pts.length; i += 2) {
        pts[i] = Math.round(pts[i] * scaleX);
        pts[i + 1] = Math.round(pts[i + 1] * scaleY);
      }
      a.coords = pts.join(',');
    });
  }

  function mdToHtml(src) {
    var esc = src
      .replace(/&/g, '&amp;')
      .replace(/</g, '&lt;')
      .replace(/>/g, '&gt;');
    return esc.split(/\n{2,}/).map(function(block) {
      var t = block
        .replace(/\*\*([^*]+)\*\*/g, '<strong>$1</strong>')
        .replace(/\*([^*]+)\*/g, '<em>$1</em>')
        .replace(/`([^`]+)`/g, '<code>$1</code>')
        .replace(/\n/g, '<br>');
      return '<p>' + t + '</p>';
    }).join('');
  }

  function showPanel(id) {
    var t = TRANSLATIONS.find(function(tr) { return tr.id === id; });
    var text = document.getElementById('modal-text');
    text.innerHTML = t ? mdToHtml(t.translation) : '<p>Bez překladu</p>';
    var crop = document.getElementById('modal-crop');
    if (t && t.image) {
      crop.src = 'data:image/png;base64,' + t.image;
      crop.style.display = 'block';
    } else {
      crop.removeAttribute('src');
      crop.style.display = 'none';
    }
    modal.style.display = 'block';
  }

  Array.prototype.forEach.call(map.querySelectorAll('area'), function(area) {
    area.addEventListener('click', function(e) {
      e.preventDefault();
      showPanel(area.dataset.panelId);
    });
  });

  modal.addEventListener('click', function() {
    modal.style.display = 'none';
  });

  if (img.complete) rescaleMap();
  img.addEventListener('load', rescaleMap);
  window.addEventListener('resize', rescaleMap);
})();
</script>
</body>
</html>
"#,
    );

    html
}

/// Index celého běhu: odkaz na každou vyrenderovanou stránku, ve stejném
/// pořadí, v jakém byly stránky objeveny (abecedně podle názvu souboru).
pub fn render_index_html(entries: &[IndexEntry]) -> String {
    let mut html = String::new();

    html.push_str(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Komiks – stránky</title>
<style>
  :root {
    color-scheme: dark;
    --bg-panel: #161824;
    --border-soft: #2a2f40;
    --accent: #4fc3f7;
    --text-main: #f5f7ff;
    --text-muted: #9ca3af;
  }

  body {
    margin: 0;
    padding: 0;
    background: radial-gradient(circle at top, #202542 0, #050611 55%);
    color: var(--text-main);
    font-family: system-ui, -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
    min-height: 100vh;
  }

  header {
    padding: 14px 18px;
    border-bottom: 1px solid var(--border-soft);
    background: linear-gradient(90deg, #12141f, #191c2b);
  }

  header h1 { font-size: 18px; margin: 0; }

  main { padding: 16px; }

  .panel {
    background: var(--bg-panel);
    border-radius: 12px;
    border: 1px solid var(--border-soft);
    padding: 12px 14px;
    max-width: 720px;
    margin: 0 auto;
  }

  .pages-list {
    list-style: none;
    padding: 0;
    margin: 0;
    display: grid;
    gap: 8px;
  }

  .pages-list a {
    display: block;
    padding: 10px 12px;
    border-radius: 8px;
    background: radial-gradient(circle at top left, rgba(79,195,247,0.12) 0, #101222 55%);
    border: 1px solid rgba(79,195,247,0.3);
    color: var(--text-main);
    text-decoration: none;
    font-size: 13px;
  }

  .pages-list a:hover { background: rgba(79,195,247,0.2); }
  .page-title { font-weight: 600; margin-bottom: 2px; }
  .page-sub { font-size: 11px; color: var(--text-muted); }

  .empty {
    font-size: 13px;
    color: var(--text-muted);
    padding: 12px;
    border-radius: 8px;
    border: 1px dashed var(--border-soft);
  }
</style>
</head>
<body>
<header>
  <h1>Komiks – přeložené stránky</h1>
</header>
<main>
  <section class="panel">
"#,
    );

    if entries.is_empty() {
        html.push_str(r#"    <div class="empty">Žádné vyrenderované stránky.</div>"#);
        html.push('\n');
    } else {
        html.push_str("    <ul class=\"pages-list\">\n");
        for e in entries {
            html.push_str("      <li><a href=\"");
            html.push_str(&html_escape(&e.html_file));
            html.push_str("\"><div class=\"page-title\">");
            html.push_str(&html_escape(&e.image_file));
            html.push_str("</div><div class=\"page-sub\">");
            html.push_str(&panel_count_label(e.panel_count));
            html.push_str("</div></a></li>\n");
        }
        html.push_str("    </ul>\n");
    }

    html.push_str(
        r#"  </section>
</main>
</body>
</html>
"#,
    );

    html
}

/// Celočíselné souřadnice pro atribut `coords` – stejné zaokrouhlení
/// jako při výřezu panelu.
fn area_coords(p: &AnnotatedPanel) -> String {
    format!(
        "{},{},{},{}",
        p.bx.x1.round() as i64,
        p.bx.y1.round() as i64,
        p.bx.x2.round() as i64,
        p.bx.y2.round() as i64,
    )
}

/// JSON vložený do `<script>` bloku: `</` se escapuje, aby obsah anotace
/// nemohl předčasně ukončit skript.
fn embed_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn panel_count_label(count: usize) -> String {
    match count {
        1 => "1 panel".to_string(),
        2..=4 => format!("{count} panely"),
        _ => format!("{count} panelů"),
    }
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Annotation;
    use crate::boxes::{BoundingBox, RawBox};
    use std::path::PathBuf;

    fn test_page() -> Page {
        let img = image::RgbImage::from_pixel(800, 1200, image::Rgb([255, 255, 255]));
        Page {
            name: "page".to_string(),
            file_name: "page.jpg".to_string(),
            path: PathBuf::from("page.jpg"),
            image: image::DynamicImage::ImageRgb8(img),
            width: 800,
            height: 1200,
            boxes: Vec::new(),
        }
    }

    fn panel(x1: f64, y1: f64, x2: f64, y2: f64, text: &str) -> AnnotatedPanel {
        let bx = BoundingBox::from_raw(RawBox { x1, y1, x2, y2 }).unwrap();
        let annotation = Annotation {
            id: bx.id.clone(),
            translation: text.to_string(),
            image: None,
        };
        AnnotatedPanel { bx, annotation }
    }

    #[test]
    fn page_document_has_one_area_per_retained_panel() {
        let page = test_page();
        let panels = vec![
            panel(400.0, 50.0, 600.0, 250.0, "Ahoj"),
            panel(100.0, 50.0, 300.0, 250.0, "Světe"),
        ];
        let html = render_page_html(&page, &panels);

        assert_eq!(html.matches("<area ").count(), 2);
        assert!(html.contains("coords=\"400,50,600,250\""));
        assert!(html.contains("coords=\"100,50,300,250\""));
        assert!(html.contains(&format!("data-panel-id=\"{}\"", panels[0].bx.id)));
        // pořadí areas kopíruje pořadí panelů
        let first = html.find("400,50,600,250").unwrap();
        let second = html.find("100,50,300,250").unwrap();
        assert!(first < second);
    }

    #[test]
    fn page_document_carries_rescale_caching_logic() {
        let page = test_page();
        let html = render_page_html(&page, &[panel(10.0, 10.0, 20.0, 20.0, "x")]);
        // přepočet vychází z cachovaného originálu, ne z aktuálních coords
        assert!(html.contains("a.dataset.orig = orig"));
        assert!(html.contains("img.naturalWidth"));
        assert!(html.contains("addEventListener('resize'"));
        assert!(html.contains("const NAT_W = 800;"));
        assert!(html.contains("const NAT_H = 1200;"));
    }

    #[test]
    fn page_document_has_placeholder_and_embedded_translations() {
        let page = test_page();
        let p = panel(10.0, 10.0, 20.0, 20.0, "**Tučný** překlad");
        let html = render_page_html(&page, &[p]);
        assert!(html.contains("Bez překladu"));
        assert!(html.contains("const TRANSLATIONS = "));
        assert!(html.contains("**Tučný** překlad"));
    }

    #[test]
    fn script_breaking_translation_is_neutralized() {
        let page = test_page();
        let p = panel(10.0, 10.0, 20.0, 20.0, "zlé</script><b>x");
        let html = render_page_html(&page, &[p]);
        assert!(!html.contains("zlé</script>"));
        assert!(html.contains("zlé<\\/script>"));
    }

    #[test]
    fn index_lists_pages_in_given_order_with_escaping() {
        let entries = vec![
            IndexEntry {
                html_file: "a.html".to_string(),
                image_file: "a&b.jpg".to_string(),
                panel_count: 1,
            },
            IndexEntry {
                html_file: "b.html".to_string(),
                image_file: "b.jpg".to_string(),
                panel_count: 5,
            },
        ];
        let html = render_index_html(&entries);
        assert!(html.contains("a&amp;b.jpg"));
        assert!(html.contains("1 panel<"));
        assert!(html.contains("5 panelů"));
        assert!(html.find("a.html").unwrap() < html.find("b.html").unwrap());
    }

    #[test]
    fn empty_index_says_so() {
        let html = render_index_html(&[]);
        assert!(html.contains("Žádné vyrenderované stránky."));
    }
}
