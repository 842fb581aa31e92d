//! Embedded single-page UI

/// The complete UI, served at `/`
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Détourage — background removal</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.6rem; }
  fieldset { border: 1px solid #ccc; border-radius: 6px; margin-bottom: 1rem; }
  label { display: block; margin: 0.4rem 0; }
  select, input[type=file] { margin-top: 0.2rem; }
  button { padding: 0.5rem 1.2rem; font-size: 1rem; cursor: pointer; }
  button:disabled { cursor: wait; opacity: 0.6; }
  .panes { display: flex; gap: 1rem; flex-wrap: wrap; margin-top: 1rem; }
  .pane { flex: 1; min-width: 280px; }
  .pane img { max-width: 100%; border: 1px solid #ddd; border-radius: 4px;
    background: repeating-conic-gradient(#eee 0% 25%, #fff 0% 50%) 0 0 / 16px 16px; }
  #status { margin: 0.8rem 0; font-weight: 500; }
  #status.error { color: #b00020; }
  #timing { color: #555; font-size: 0.9rem; }
  .cached { color: #2e7d32; }
</style>
</head>
<body>
<h1>Détourage</h1>
<p>Upload an image, pick a model and get it back with the background removed.</p>

<fieldset>
  <legend>Input</legend>
  <label>Image <input type="file" id="file" accept="image/*"></label>
  <label>Model <select id="model"></select></label>
  <label><input type="checkbox" id="matting"> Alpha matting (slower, cleaner edges)</label>
  <button id="go" disabled>Remove background</button>
</fieldset>

<div id="status"></div>
<div id="timing"></div>

<div class="panes">
  <div class="pane"><h3>Original</h3><img id="before" alt=""></div>
  <div class="pane"><h3>Result</h3><img id="after" alt="">
    <p><a id="download" hidden>Download PNG</a></p></div>
</div>

<script>
const fileInput = document.getElementById('file');
const modelSelect = document.getElementById('model');
const mattingBox = document.getElementById('matting');
const goButton = document.getElementById('go');
const statusEl = document.getElementById('status');
const timingEl = document.getElementById('timing');
const beforeImg = document.getElementById('before');
const afterImg = document.getElementById('after');
const downloadLink = document.getElementById('download');

async function loadModels() {
  const res = await fetch('/api/models');
  const models = await res.json();
  for (const m of models) {
    const opt = document.createElement('option');
    opt.value = m.name;
    opt.textContent = m.name + ' — ' + m.description + (m.cached ? ' (cached)' : '');
    if (m.name === 'isnet-general-use') opt.selected = true;
    modelSelect.appendChild(opt);
  }
}
loadModels();

fileInput.addEventListener('change', () => {
  goButton.disabled = !fileInput.files.length;
  if (fileInput.files.length) {
    beforeImg.src = URL.createObjectURL(fileInput.files[0]);
  }
});

goButton.addEventListener('click', async () => {
  const file = fileInput.files[0];
  if (!file) return;

  goButton.disabled = true;
  statusEl.className = '';
  statusEl.textContent = 'Processing… (first use of a model downloads it)';
  timingEl.textContent = '';
  afterImg.removeAttribute('src');
  downloadLink.hidden = true;

  const form = new FormData();
  form.append('image', file, file.name);
  form.append('model', modelSelect.value);
  form.append('alpha_matting', mattingBox.checked ? 'true' : 'false');

  try {
    const res = await fetch('/api/remove', { method: 'POST', body: form });
    if (!res.ok) {
      const body = await res.json().catch(() => ({ error: res.statusText }));
      throw new Error(body.error || 'Request failed');
    }
    const blob = await res.blob();
    const url = URL.createObjectURL(blob);
    afterImg.src = url;

    const ms = res.headers.get('x-processing-time-ms');
    if (ms) timingEl.textContent = 'Processed in ' + ms + ' ms';

    const disposition = res.headers.get('content-disposition') || '';
    const match = disposition.match(/filename="(.+)"/);
    downloadLink.href = url;
    downloadLink.download = match ? match[1] : 'no_bg.png';
    downloadLink.hidden = false;
    statusEl.textContent = 'Done';
  } catch (err) {
    statusEl.className = 'error';
    statusEl.textContent = 'Could not process the image: ' + err.message;
  } finally {
    goButton.disabled = false;
  }
});
</script>
</body>
</html>
"#;
