//! ページ内で実行するJavaScript
//!
//! WebSquare は画面を入れ子の iframe に分けて描画するため、
//! どのスクリプトも `window.frames` を再帰的にたどる。

/// モーダル（お知らせ等）を非表示にして閉じるボタンを押す
pub const CLOSE_MODALS: &str = r#"
(function() {
    function sweep(win) {
        try {
            var doc = win.document;
            doc.querySelectorAll('.w2modal_popup, .w2modal_lay').forEach(function(e) { e.style.display = 'none'; });
            doc.querySelectorAll('.close, .btn_close, .btn_cancel').forEach(function(e) { e.click(); });
            for (var i = 0; i < win.frames.length; i++) { sweep(win.frames[i]); }
        } catch (e) {}
    }
    sweep(window);
    return true;
})()
"#;

/// 検索欄の有無・ログイン画面かどうか・セッション切れ表示を調べる
pub const PROBE_SESSION: &str = r#"
(function() {
    var hasSearchInput = false;
    var expired = false;
    function dive(win) {
        try {
            var doc = win.document;
            if (doc.querySelector('input[id*="containerNo"]')) { hasSearchInput = true; }
            var text = doc.body ? doc.body.innerText : '';
            if (text.indexOf('세션이 만료') !== -1 || text.indexOf('다시 로그인') !== -1) { expired = true; }
            for (var i = 0; i < win.frames.length; i++) { dive(win.frames[i]); }
        } catch (e) {}
    }
    dive(window);
    return JSON.stringify({
        url: window.location.href,
        title: document.title,
        loginForm: document.querySelector('#mf_wfm_subContainer_ibx_userId') !== null,
        hasSearchInput: hasSearchInput,
        expired: expired
    });
})()
"#;

/// ログインフォームの表示待ち
pub const HAS_LOGIN_FORM: &str =
    "document.querySelector('#mf_wfm_subContainer_ibx_userId') !== null";

/// ログインボタンを押す（見つからなければ false）
pub const CLICK_LOGIN: &str = r#"
(function() {
    var btn = document.querySelector('[id*="btnLogin"], [id*="btn_login"]');
    if (!btn) {
        var candidates = document.querySelectorAll('a, button, input[type="button"], span');
        for (var i = 0; i < candidates.length; i++) {
            var label = (candidates[i].innerText || candidates[i].value || '').trim();
            if (label === '로그인') { btn = candidates[i]; break; }
        }
    }
    if (btn) { btn.click(); return true; }
    return false;
})()
"#;

/// 表示テキストが一致する要素をクリックする関数呼び出しを組み立てる
pub fn click_text(label: &str) -> String {
    let label = serde_json::to_string(label).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
(function(label) {{
    function dive(win) {{
        try {{
            var nodes = win.document.querySelectorAll('a, span, li, div, button');
            for (var i = 0; i < nodes.length; i++) {{
                if (nodes[i].children.length === 0 && (nodes[i].innerText || '').trim() === label) {{
                    nodes[i].click();
                    return true;
                }}
            }}
            for (var j = 0; j < win.frames.length; j++) {{ if (dive(win.frames[j])) {{ return true; }} }}
        }} catch (e) {{}}
        return false;
    }}
    return dive(window);
}})({label})
"#
    )
}

/// コンテナ番号を入力して照会ボタンを押す
///
/// 戻り値: "OK" / "OK_ENTER"（ボタンがなくEnterで送信）/ "INPUT_NOT_FOUND"
pub fn fill_and_search(container_no: &str) -> String {
    let value = serde_json::to_string(container_no).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
(function(value) {{
    function dive(win) {{
        try {{
            var doc = win.document;
            var input = doc.querySelector('input[id*="containerNo"]');
            if (input) {{
                input.focus();
                input.value = '';
                input.value = value;
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                input.dispatchEvent(new Event('change', {{ bubbles: true }}));
                var btn = doc.querySelector('[id*="btnSearch"]');
                if (btn) {{ btn.click(); return 'OK'; }}
                var opts = {{ key: 'Enter', keyCode: 13, which: 13, bubbles: true }};
                input.dispatchEvent(new KeyboardEvent('keydown', opts));
                input.dispatchEvent(new KeyboardEvent('keyup', opts));
                return 'OK_ENTER';
            }}
            for (var i = 0; i < win.frames.length; i++) {{
                var r = dive(win.frames[i]);
                if (r) {{ return r; }}
            }}
        }} catch (e) {{}}
        return null;
    }}
    return dive(window) || 'INPUT_NOT_FOUND';
}})({value})
"#
    )
}

/// 照会番号を含むフレームから移動履歴の行を `|` 区切りで抽出する
pub fn scrape_grid(container_no: &str) -> String {
    let value = serde_json::to_string(container_no).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
(function(searchNo) {{
    searchNo = searchNo.replace(/[^A-Z0-9]/gi, '').toUpperCase();
    var results = [];
    function dive(win) {{
        try {{
            var doc = win.document;
            var content = (doc.body ? doc.body.innerText : '').toUpperCase();
            var inputs = doc.querySelectorAll('input');
            for (var i = 0; i < inputs.length; i++) {{ content += ' ' + (inputs[i].value || '').toUpperCase(); }}
            if (content.replace(/[^A-Z0-9]/g, '').indexOf(searchNo) !== -1) {{
                var rows = doc.querySelectorAll('tr');
                for (var j = 0; j < rows.length; j++) {{
                    var cells = rows[j].cells;
                    if (!cells || cells.length < 5) {{ continue; }}
                    var values = [];
                    for (var k = 0; k < cells.length; k++) {{ values.push(cells[k].innerText.trim().replace(/\n/g, ' ')); }}
                    var line = values.join('|');
                    if (/^\d+\|/.test(line) && /수입|수출|반입|반출/.test(line)) {{ results.push(line); }}
                }}
            }}
            for (var f = 0; f < win.frames.length; f++) {{ dive(win.frames[f]); }}
        }} catch (e) {{}}
    }}
    dive(window);
    return Array.from(new Set(results)).join('\n');
}})({value})
"#
    )
}
