use mocha::{
    BearerAuth, Client, ErrorStatus, HeaderInterceptor, InterceptorError, Request, Response,
    RetryOnStatus,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder()
        .request_interceptor(HeaderInterceptor::try_new("x-client", "mocha-demo")?)
        .request_interceptor(BearerAuth::new("demo-token")?)
        .request_interceptor(|request: Request| -> Result<Request, InterceptorError> {
            if request.url().contains("/admin") {
                return Err(InterceptorError::new("admin endpoints are off limits"));
            }
            Ok(request.with_query("source", "demo"))
        })
        .response_interceptor(RetryOnStatus::default())
        .response_interceptor(ErrorStatus)
        .response_interceptor(|response: Response| -> Result<Response, InterceptorError> {
            println!("<- {} ({} bytes)", response.status(), response.body().len());
            Ok(response)
        })
        .retry_enabled(true)
        .build();

    let response = client.get("https://httpbin.org/headers").execute()?;
    let headers = response.json_map()?.get("headers");
    println!("x-client={} authorization={}", headers.get("X-Client"), headers.get("Authorization"));

    match client.get("https://httpbin.org/admin").execute() {
        Ok(_) => println!("unexpected success"),
        Err(error) => println!("blocked: {error}"),
    }

    match client.get("https://httpbin.org/status/404").execute() {
        Ok(_) => println!("unexpected success"),
        Err(error) => println!("rejected: {error} [{}]", error.code()),
    }
    Ok(())
}
