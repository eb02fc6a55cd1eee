//! The notebook page.
//!
//! Math lines are edited with the MathLive `<math-field>` web component. All
//! state lives on the server; the script sends one edit per change and
//! re-renders from the notebook it gets back.

use super::styles::STYLE;
use crate::samples::SAMPLE_NAMES;

const MATHLIVE_SRC: &str = "https://unpkg.com/mathlive";

const SCRIPT: &str = r#"
const KINDS = ['text', 'math', 'header', 'image', 'break'];
let notebook = null;
const busy = new Set();

function banner(message, isError) {
    const el = document.getElementById('banner');
    el.textContent = message || '';
    el.className = isError ? 'banner error' : 'banner';
}

async function api(method, path, body) {
    const opts = { method, headers: {} };
    if (body !== undefined) {
        opts.headers['Content-Type'] = 'application/json';
        opts.body = JSON.stringify(body);
    }
    const res = await fetch(path, opts);
    const data = await res.json().catch(() => ({}));
    if (!res.ok) {
        throw new Error(data.error || res.statusText);
    }
    return data;
}

async function edit(op) {
    try {
        notebook = await api('POST', '/api/notebook/edit', op);
        render();
    } catch (e) {
        banner(e.message, true);
    }
}

async function runLine(index, action) {
    const id = notebook.lines[index].id;
    const key = action + ':' + id;
    if (busy.has(key)) return;
    busy.add(key);
    render();
    try {
        const res = await api('POST', `/api/notebook/lines/${index}/${action}`);
        notebook = res.notebook;
        banner('');
    } catch (e) {
        banner(`${action} failed: ${e.message}`, true);
    } finally {
        busy.delete(key);
        render();
    }
}

function contentEditor(line, index) {
    if (line.mode === 'break') {
        return document.createElement('div');
    }
    if (line.mode === 'math') {
        const field = document.createElement('math-field');
        field.value = line.content;
        field.addEventListener('change', () =>
            edit({ op: 'update_content', index, content: field.value }));
        return field;
    }
    if (line.mode === 'image') {
        const wrap = document.createElement('div');
        if (line.content) {
            const img = document.createElement('img');
            img.src = line.content;
            wrap.appendChild(img);
        }
        const file = document.createElement('input');
        file.type = 'file';
        file.accept = 'image/*';
        file.addEventListener('change', () => {
            const reader = new FileReader();
            reader.onload = () => edit({ op: 'update_content', index, content: reader.result });
            if (file.files[0]) reader.readAsDataURL(file.files[0]);
        });
        wrap.appendChild(file);
        return wrap;
    }
    const input = document.createElement('input');
    input.className = 'content';
    input.value = line.content;
    input.addEventListener('change', () =>
        edit({ op: 'update_content', index, content: input.value }));
    input.addEventListener('keydown', (ev) => {
        if (ev.key === 'Enter') {
            ev.preventDefault();
            edit({ op: 'insert_after', index, mode: line.mode === 'header' ? 'text' : line.mode, content: '' });
        }
    });
    input.addEventListener('paste', (ev) => {
        const text = ev.clipboardData.getData('text');
        if (!text.includes('\n')) return;
        ev.preventDefault();
        const pasted = text.split(/\r?\n/).map(content => ({ mode: line.mode, content }));
        const lines = notebook.lines.map(l => ({ mode: l.mode, content: l.content, isProblem: l.isProblem }));
        lines.splice(index + 1, 0, ...pasted);
        edit({ op: 'replace_all', lines });
    });
    return input;
}

function button(label, onClick, disabled) {
    const b = document.createElement('button');
    b.textContent = label;
    b.disabled = !!disabled;
    b.addEventListener('click', onClick);
    return b;
}

function render() {
    const root = document.getElementById('lines');
    root.innerHTML = '';
    notebook.lines.forEach((line, index) => {
        const row = document.createElement('div');
        row.className = 'line ' + line.mode + (line.isProblem ? ' given' : '');

        const kind = document.createElement('select');
        KINDS.forEach(k => {
            const opt = document.createElement('option');
            opt.value = k;
            opt.textContent = k;
            opt.selected = k === line.mode;
            kind.appendChild(opt);
        });
        kind.addEventListener('change', () => edit({ op: 'update_kind', index, mode: kind.value }));
        row.appendChild(kind);

        row.appendChild(contentEditor(line, index));

        const actions = document.createElement('div');
        actions.className = 'actions';
        if (line.mode !== 'break' && line.mode !== 'header') {
            actions.appendChild(button(line.isProblem ? 'given' : 'work',
                () => edit({ op: 'toggle_problem_context', index })));
            if (!line.isProblem) {
                actions.appendChild(button('check', () => runLine(index, 'check'), busy.has('check:' + line.id)));
            }
            actions.appendChild(button('hint', () => runLine(index, 'hint'), busy.has('hint:' + line.id)));
        }
        actions.appendChild(button('+', () => edit({ op: 'insert_after', index, mode: 'math', content: '' })));
        actions.appendChild(button('×', () => edit({ op: 'delete', index })));
        row.appendChild(actions);

        const verdict = notebook.feedback[line.id];
        if (verdict) {
            const v = document.createElement('div');
            v.className = 'verdict ' + verdict.status;
            v.textContent = verdict.status === 'ok' ? '✓ looks right' : '✗ ' + (verdict.latex || 'check this step');
            row.appendChild(v);
        }
        const hint = notebook.hints[line.id];
        if (hint) {
            const h = document.createElement('div');
            h.className = 'hint';
            h.textContent = 'Hint: ' + hint;
            row.appendChild(h);
        }
        root.appendChild(row);
    });
}

async function exportFile() {
    const data = await api('GET', '/api/notebook');
    const blob = new Blob([JSON.stringify(data, null, 2)], { type: 'application/json' });
    const a = document.createElement('a');
    a.href = URL.createObjectURL(blob);
    a.download = 'notebook.json';
    a.click();
}

async function importFile(input) {
    const file = input.files[0];
    if (!file) return;
    let body;
    try {
        body = JSON.parse(await file.text());
    } catch (e) {
        body = {};
    }
    try {
        notebook = await api('PUT', '/api/notebook', body);
        banner('');
    } catch (e) {
        banner('Import rejected: ' + e.message, true);
        notebook = await api('GET', '/api/notebook');
    }
    render();
}

async function loadTemplate(select) {
    if (!select.value) return;
    try {
        notebook = await api('POST', '/api/notebook/template/' + encodeURIComponent(select.value));
        render();
    } catch (e) {
        banner(e.message, true);
    }
    select.value = '';
}

async function resetNotebook() {
    notebook = await api('DELETE', '/api/notebook');
    render();
}

window.addEventListener('DOMContentLoaded', async () => {
    notebook = await api('GET', '/api/notebook');
    render();
});
"#;

/// Escape text for inclusion in HTML.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render_notebook_page(demo_mode: bool, service_configured: bool) -> String {
    let mut notices = Vec::new();
    if demo_mode {
        notices.push("Demo mode: changes are not saved.");
    }
    if !service_configured {
        notices.push("No reasoning service credential is configured; checks and hints are unavailable.");
    }
    let notice = html_escape(&notices.join(" "));

    let template_options: String = SAMPLE_NAMES
        .iter()
        .map(|name| format!(r#"<option value="{0}">{0}</option>"#, html_escape(name)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Mathpad</title>
    <style>{style}</style>
    <script defer src="{mathlive}"></script>
</head>
<body>
    <nav class="nav-bar">
        <span class="title">Mathpad</span>
        <span class="spacer"></span>
        <select onchange="loadTemplate(this)">
            <option value="">Load example…</option>
            {template_options}
        </select>
        <button onclick="exportFile()">Export</button>
        <label><button onclick="this.nextElementSibling.click()">Import</button><input type="file" accept="application/json" hidden onchange="importFile(this)"></label>
        <a href="/api/notebook/latex" download="notebook.tex">LaTeX</a>
        <button onclick="resetNotebook()">Clear</button>
    </nav>
    <div class="container">
        <div id="notice" class="banner">{notice}</div>
        <div id="banner" class="banner"></div>
        <div id="lines"></div>
    </div>
    <script>{script}</script>
</body>
</html>"#,
        style = STYLE,
        mathlive = MATHLIVE_SRC,
        template_options = template_options,
        notice = notice,
        script = SCRIPT,
    )
}
