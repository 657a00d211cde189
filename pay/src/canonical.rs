//! 待签名字符串
//!
//! 过滤掉 `sign` 与空值, 按参数名字节序升序排列, 以 `key=value` 用 `&` 连接.
//! 参数值保持原样, 不做 URL 编码.

/// Fields never covered by a request signature.
const REQUEST_EXCLUDED: &[&str] = &["sign"];

/// Asynchronous notifications are signed without `sign_type` as well.
const NOTIFY_EXCLUDED: &[&str] = &["sign", "sign_type"];

/// 请求签名用的待签名字符串
pub fn canonicalize<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    build(params, REQUEST_EXCLUDED)
}

/// 异步通知验签用的待签名字符串
pub fn canonicalize_notify<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    build(params, NOTIFY_EXCLUDED)
}

fn build<I, K, V>(params: I, excluded: &[&str]) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs = params
        .into_iter()
        .filter(|(key, value)| !value.as_ref().is_empty() && !excluded.contains(&key.as_ref()))
        .collect::<Vec<_>>();
    pairs.sort_by(|a, b| a.0.as_ref().as_bytes().cmp(b.0.as_ref().as_bytes()));

    let mut content = String::new();
    for (key, value) in pairs.iter() {
        if !content.is_empty() {
            content.push('&');
        }
        content.push_str(key.as_ref());
        content.push('=');
        content.push_str(value.as_ref());
    }

    content
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn skips_sign_and_empty_values() {
        let params = vec![("a", "1"), ("b", ""), ("sign", "X"), ("c", "3")];

        assert_eq!(canonicalize(params), "a=1&c=3");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let pairs = [
            ("timestamp", "2024-01-01 10:00:00"),
            ("app_id", "2021000000000000"),
            ("method", "alipay.trade.query"),
            ("biz_content", r#"{"out_trade_no":"ORDER123"}"#),
            ("charset", "utf-8"),
        ];
        let expected = canonicalize(pairs);

        let mut reversed = pairs;
        reversed.reverse();
        assert_eq!(canonicalize(reversed), expected);

        let map = pairs.iter().copied().collect::<HashMap<_, _>>();
        assert_eq!(canonicalize(map), expected);

        assert_eq!(
            expected,
            "app_id=2021000000000000&biz_content={\"out_trade_no\":\"ORDER123\"}\
             &charset=utf-8&method=alipay.trade.query&timestamp=2024-01-01 10:00:00"
        );
    }

    #[test]
    fn sorts_by_bytes() {
        let params = vec![("b", "2"), ("B", "1"), ("a_b", "4"), ("aB", "3")];

        assert_eq!(canonicalize(params), "B=1&aB=3&a_b=4&b=2");
    }

    #[test]
    fn values_are_not_url_encoded() {
        let params = vec![("notify_url", "https://shop.example/notify?a=1&b=2"), ("subject", "商品 A")];

        assert_eq!(
            canonicalize(params),
            "notify_url=https://shop.example/notify?a=1&b=2&subject=商品 A"
        );
    }

    #[test]
    fn notify_form_skips_sign_type() {
        let params = vec![("sign_type", "RSA2"), ("sign", "X"), ("trade_status", "TRADE_SUCCESS")];

        assert_eq!(canonicalize(params.clone()), "sign_type=RSA2&trade_status=TRADE_SUCCESS");
        assert_eq!(canonicalize_notify(params), "trade_status=TRADE_SUCCESS");
    }
}
