//! The runtime-assisted script preamble: a small piece of generated code
//! prepended to every node's rendered script, giving it `ret`/`dep`/`weak`/
//! `soft`/`retain` (Bash) or an `mdl` surface (Python).

use std::path::Path;

/// Bash preamble: defines `ret`, the parse-time no-ops `dep`/`weak`/`soft`,
/// and `retain`. `ret` lines are buffered to a side file and assembled into
/// `output.json` by a trap on shell exit, so a script that `exit`s early
/// (or crashes) still publishes whatever it recorded.
pub fn bash_preamble(output_json: &Path, retain_flag: &Path) -> String {
    format!(
        r#"MDL_OUTPUT_JSON={output_json:?}
__mdl_retain_flag={retain_flag:?}
__mdl_outputs_tmp="$(mktemp)"

ret() {{
  local spec="$1"
  local name_type="${{spec%%=*}}"
  local value="${{spec#*=}}"
  local name="${{name_type%%:*}}"
  local type="${{name_type#*:}}"
  printf '%s\t%s\t%s\n' "$name" "$type" "$value" >> "$__mdl_outputs_tmp"
}}

dep() {{ :; }}
weak() {{ :; }}
soft() {{ :; }}
retain() {{ : > "$__mdl_retain_flag"; }}

__mdl_finalize() {{
  local first=1
  {{
    printf '{{'
    while IFS=$'\t' read -r name type value; do
      [ "$first" -eq 1 ] || printf ','
      first=0
      case "$type" in
        int|bool) printf '"%s":{{"type":"%s","value":%s}}' "$name" "$type" "$value" ;;
        *) printf '"%s":{{"type":"string","value":"%s"}}' "$name" "$(printf '%s' "$value" | sed 's/\\/\\\\/g; s/"/\\"/g')" ;;
      esac
    done < "$__mdl_outputs_tmp"
    printf '}}'
  }} > "$MDL_OUTPUT_JSON"
  rm -f "$__mdl_outputs_tmp"
}}
trap __mdl_finalize EXIT
"#
    )
}

/// Python preamble: reads the per-node context file and exposes it as an
/// `mdl` object with `sys`/`env`/`args`/`flags`/`actions` fields and
/// `ret`/`dep`/`weak`/`retain`/`is_retained` methods.
pub fn python_preamble(output_json: &Path, retain_flag: &Path, context_json: &Path) -> String {
    format!(
        r#"import atexit as __mdl_atexit
import json as __mdl_json


class _MdlSurface:
    def __init__(self, output_path, retain_flag, context):
        self._output_path = output_path
        self._retain_flag = retain_flag
        self.sys = context["system"]
        self.env = context["env"]
        self.args = context["args"]
        self.flags = context["flags"]
        self.actions = context["actions"]
        self._retained = context["retained"]
        self._outputs = {{}}

    def ret(self, name, value, type="string"):
        self._outputs[name] = {{"type": type, "value": value}}

    def dep(self, _name):
        pass

    def weak(self, _name):
        pass

    def retain(self):
        with open(self._retain_flag, "w") as fh:
            fh.write("1")

    def is_retained(self, name):
        return bool(self._retained.get(name, False))

    def _finalize(self):
        with open(self._output_path, "w") as fh:
            __mdl_json.dump(self._outputs, fh)


with open({context_json:?}) as __mdl_ctx_fh:
    __mdl_ctx = __mdl_json.load(__mdl_ctx_fh)

mdl = _MdlSurface({output_json:?}, {retain_flag:?}, __mdl_ctx)
__mdl_atexit.register(mdl._finalize)
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_preamble_defines_runtime_functions() {
        let preamble = bash_preamble(Path::new("/tmp/output.json"), Path::new("/tmp/retain.flag"));
        assert!(preamble.contains("ret() {"));
        assert!(preamble.contains("trap __mdl_finalize EXIT"));
    }

    #[test]
    fn python_preamble_wires_the_mdl_surface() {
        let preamble = python_preamble(
            Path::new("/tmp/output.json"),
            Path::new("/tmp/retain.flag"),
            Path::new("/tmp/context.json"),
        );
        assert!(preamble.contains("class _MdlSurface"));
        assert!(preamble.contains("mdl = _MdlSurface"));
    }
}
