//! CSS styles for the notebook page.

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
/* Solarized Light Theme */
:root {
    --base01: #586e75;
    --base00: #657b83;
    --base1: #93a1a1;
    --base2: #eee8d5;
    --base3: #fdf6e3;

    --yellow: #b58900;
    --red: #dc322f;
    --blue: #268bd2;
    --cyan: #2aa198;
    --green: #859900;

    --bg: var(--base3);
    --fg: var(--base00);
    --muted: var(--base1);
    --border: var(--base2);
    --link: var(--blue);
    --accent: var(--base2);
    --given-bg: #f5ecd5;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    line-height: 1.6;
    color: var(--fg);
    background: var(--bg);
}

.container {
    max-width: 900px;
    margin: 0 auto;
    padding: 1rem;
}

.nav-bar {
    position: sticky;
    top: 0;
    background: var(--bg);
    border-bottom: 1px solid var(--border);
    padding: 0.5rem 1rem;
    display: flex;
    gap: 1rem;
    align-items: center;
    flex-wrap: wrap;
    z-index: 100;
}

.nav-bar .title { font-weight: 600; color: var(--base01); }
.nav-bar .spacer { flex: 1; }

button, select {
    padding: 0.25rem 0.6rem;
    border: 1px solid var(--border);
    border-radius: 4px;
    background: var(--accent);
    color: var(--fg);
    cursor: pointer;
    font-family: inherit;
    font-size: 0.85rem;
}
button:disabled { opacity: 0.5; cursor: progress; }

.banner {
    margin: 0.75rem 0;
    padding: 0.5rem 0.75rem;
    border-left: 3px solid var(--yellow);
    background: var(--accent);
    font-size: 0.9rem;
}
.banner.error { border-left-color: var(--red); }
.banner:empty { display: none; }

.line {
    display: grid;
    grid-template-columns: 5.5rem 1fr auto;
    gap: 0.5rem;
    align-items: start;
    padding: 0.4rem 0;
    border-bottom: 1px solid var(--border);
}
.line.given { background: var(--given-bg); }
.line.break { border-bottom: 2px dashed var(--muted); }
.line.header .content { font-size: 1.2rem; font-weight: 600; }

.line .content {
    width: 100%;
    border: none;
    background: transparent;
    color: var(--fg);
    font-size: 1rem;
    font-family: inherit;
}
.line math-field { width: 100%; font-size: 1.1rem; background: transparent; }
.line img { max-width: 100%; }

.line .actions { display: flex; gap: 0.25rem; flex-wrap: wrap; }

.verdict, .hint {
    grid-column: 2 / 4;
    font-size: 0.85rem;
    padding: 0.2rem 0.5rem;
    border-radius: 3px;
}
.verdict.ok { color: var(--green); }
.verdict.issue { color: var(--red); background: #fbeaea; }
.hint { color: var(--cyan); background: #e8f5f3; }

.toolbar {
    display: flex;
    gap: 0.5rem;
    margin: 1rem 0;
    flex-wrap: wrap;
}
"#;
