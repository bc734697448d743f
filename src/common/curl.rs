use crate::common::data::RelayRequest;

/// Renders a request as an equivalent `curl` invocation so that a forwarded
/// exchange can be replayed by hand from the log output.
pub fn to_curl(request: &RelayRequest) -> String {
    let mut out = format!("curl -v -X {} '{}'", request.method(), request.url());

    for (name, value) in request.headers() {
        // Host is derived from the URL; repeating it only adds noise.
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        out.push_str(&format!(" -H '{}: {}'", name, value));
    }

    if !request.body().is_empty() {
        if let Ok(text) = std::str::from_utf8(request.body()) {
            // In POSIX shells a single quote inside a single-quoted string
            // must be written as '\''.
            out.push_str(&format!(" --data '{}'", text.replace('\'', r"'\''")));
        }
    }

    out
}
