//! HTTP implementation of the remote API traits.
//!
//! Speaks the provider's JSON REST dialect. Every mutating request carries
//! a fresh `clientToken` so the provider can deduplicate retried writes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::{BlbApi, EipApi, InstanceApi, VpcApi};
use crate::error::{ApiError, Result};
use crate::types::{
    BackendServer, CreateEipArgs, CreateLoadBalancerArgs, CreateLoadBalancerResponse,
    CreateRouteRuleArgs, Eip, EipInstanceType, Instance, LoadBalancer, RouteTable, TcpListener,
};

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base endpoint, with or without scheme.
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Client for the BLB, EIP, VPC and CCE REST APIs.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ErrorBody {
    code: String,
    message: String,
    request_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadBalancerList {
    #[serde(default)]
    blb_list: Vec<LoadBalancer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenerList {
    #[serde(default)]
    listener_list: Vec<TcpListener>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendServerList<T> {
    #[serde(default = "Vec::new")]
    backend_server_list: Vec<T>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PortList<'a> {
    port_list: &'a [u16],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateListenerBody<'a> {
    backend_port: u16,
    scheduler: &'a str,
}

#[derive(Deserialize)]
struct CreateEipResponse {
    eip: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EipList {
    #[serde(default)]
    eip_list: Vec<Eip>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BindEipBody<'a> {
    instance_type: &'a str,
    instance_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRouteRuleResponse {
    route_rule_id: String,
}

#[derive(Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<Instance>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base: base_url(&config.endpoint),
        })
    }

    /// The normalized base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{} {}/{}", method, self.base, path);
        self.http.request(method, format!("{}/{}", self.base, path))
    }

    /// A mutating request, stamped with a fresh client token.
    fn write(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path)
            .query(&[("clientToken", Uuid::new_v4().to_string())])
    }

    async fn execute(&self, req: RequestBuilder) -> Result<String> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                code: err.code,
                message: if err.message.is_empty() { body } else { err.message },
                request_id: err.request_id,
            });
        }

        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let body = self.execute(req).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn with_body<B: Serialize>(req: RequestBuilder, body: &B) -> Result<RequestBuilder> {
        Ok(req
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?))
    }
}

fn base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ApiError::InvalidArgument(format!("{} is required", what)));
    }
    Ok(())
}

#[async_trait]
impl BlbApi for HttpClient {
    async fn describe_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancer>> {
        let req = self.request(Method::GET, "v1/blb").query(&[("name", name)]);
        let list: LoadBalancerList = self.fetch(req).await?;
        Ok(list.blb_list)
    }

    async fn create_load_balancer(
        &self,
        args: &CreateLoadBalancerArgs,
    ) -> Result<CreateLoadBalancerResponse> {
        require(&args.name, "load balancer name")?;
        let req = Self::with_body(self.write(Method::POST, "v1/blb"), args)?;
        self.fetch(req).await
    }

    async fn delete_load_balancer(&self, lb_id: &str) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self.write(Method::DELETE, &format!("v1/blb/{}", lb_id));
        self.execute(req).await.map(|_| ())
    }

    async fn describe_tcp_listeners(
        &self,
        lb_id: &str,
        port: Option<u16>,
    ) -> Result<Vec<TcpListener>> {
        require(lb_id, "load balancer id")?;
        let mut req = self.request(Method::GET, &format!("v1/blb/{}/TCPlistener", lb_id));
        if let Some(port) = port {
            req = req.query(&[("listenerPort", port)]);
        }
        let list: ListenerList = self.fetch(req).await?;
        Ok(list.listener_list)
    }

    async fn create_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self.write(Method::POST, &format!("v1/blb/{}/TCPlistener", lb_id));
        let req = Self::with_body(req, listener)?;
        self.execute(req).await.map(|_| ())
    }

    async fn update_tcp_listener(&self, lb_id: &str, listener: &TcpListener) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self
            .write(Method::PUT, &format!("v1/blb/{}/TCPlistener", lb_id))
            .query(&[("listenerPort", listener.listener_port)]);
        let body = UpdateListenerBody {
            backend_port: listener.backend_port,
            scheduler: &listener.scheduler,
        };
        let req = Self::with_body(req, &body)?;
        self.execute(req).await.map(|_| ())
    }

    async fn delete_listeners(&self, lb_id: &str, ports: &[u16]) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self
            .write(Method::PUT, &format!("v1/blb/{}/listener", lb_id))
            .query(&[("batchdelete", "")]);
        let req = Self::with_body(req, &PortList { port_list: ports })?;
        self.execute(req).await.map(|_| ())
    }

    async fn describe_backend_servers(&self, lb_id: &str) -> Result<Vec<BackendServer>> {
        require(lb_id, "load balancer id")?;
        let req = self.request(Method::GET, &format!("v1/blb/{}/backendserver", lb_id));
        let list: BackendServerList<BackendServer> = self.fetch(req).await?;
        Ok(list.backend_server_list)
    }

    async fn add_backend_servers(&self, lb_id: &str, servers: &[BackendServer]) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self.write(Method::POST, &format!("v1/blb/{}/backendserver", lb_id));
        let body = BackendServerList {
            backend_server_list: servers.to_vec(),
        };
        let req = Self::with_body(req, &body)?;
        self.execute(req).await.map(|_| ())
    }

    async fn remove_backend_servers(&self, lb_id: &str, instance_ids: &[String]) -> Result<()> {
        require(lb_id, "load balancer id")?;
        let req = self.write(Method::PUT, &format!("v1/blb/{}/backendserver", lb_id));
        let body = BackendServerList {
            backend_server_list: instance_ids.to_vec(),
        };
        let req = Self::with_body(req, &body)?;
        self.execute(req).await.map(|_| ())
    }
}

#[async_trait]
impl EipApi for HttpClient {
    async fn create_eip(&self, args: &CreateEipArgs) -> Result<String> {
        if args.bandwidth_in_mbps == 0 {
            return Err(ApiError::InvalidArgument(
                "EIP bandwidth is required".to_string(),
            ));
        }
        let req = Self::with_body(self.write(Method::POST, "v1/eip"), args)?;
        let created: CreateEipResponse = self.fetch(req).await?;
        Ok(created.eip)
    }

    async fn get_eips(&self, ip: Option<&str>) -> Result<Vec<Eip>> {
        let mut req = self.request(Method::GET, "v1/eip");
        if let Some(ip) = ip {
            req = req.query(&[("eip", ip)]);
        }
        let list: EipList = self.fetch(req).await?;
        Ok(list.eip_list)
    }

    async fn bind_eip(
        &self,
        ip: &str,
        instance_type: EipInstanceType,
        instance_id: &str,
    ) -> Result<()> {
        require(ip, "EIP")?;
        require(instance_id, "instance id")?;
        let req = self
            .write(Method::PUT, &format!("v1/eip/{}", ip))
            .query(&[("bind", "")]);
        let body = BindEipBody {
            instance_type: instance_type.as_str(),
            instance_id,
        };
        let req = Self::with_body(req, &body)?;
        self.execute(req).await.map(|_| ())
    }

    async fn unbind_eip(&self, ip: &str) -> Result<()> {
        require(ip, "EIP")?;
        let req = self
            .write(Method::PUT, &format!("v1/eip/{}", ip))
            .query(&[("unbind", "")]);
        self.execute(req).await.map(|_| ())
    }

    async fn delete_eip(&self, ip: &str) -> Result<()> {
        require(ip, "EIP")?;
        let req = self.write(Method::DELETE, &format!("v1/eip/{}", ip));
        self.execute(req).await.map(|_| ())
    }
}

#[async_trait]
impl VpcApi for HttpClient {
    async fn get_route_table(&self, vpc_id: &str) -> Result<RouteTable> {
        require(vpc_id, "VPC id")?;
        let req = self.request(Method::GET, "v1/route").query(&[("vpcId", vpc_id)]);
        self.fetch(req).await
    }

    async fn create_route_rule(&self, args: &CreateRouteRuleArgs) -> Result<String> {
        require(&args.route_table_id, "route table id")?;
        let req = Self::with_body(self.write(Method::POST, "v1/route/rule"), args)?;
        let created: CreateRouteRuleResponse = self.fetch(req).await?;
        Ok(created.route_rule_id)
    }

    async fn delete_route_rule(&self, rule_id: &str) -> Result<()> {
        require(rule_id, "route rule id")?;
        let req = self.write(Method::DELETE, &format!("v1/route/rule/{}", rule_id));
        self.execute(req).await.map(|_| ())
    }
}

#[async_trait]
impl InstanceApi for HttpClient {
    async fn list_instances(&self, cluster_id: &str) -> Result<Vec<Instance>> {
        require(cluster_id, "cluster id")?;
        let req = self.request(Method::GET, &format!("v1/cluster/{}/instances", cluster_id));
        let list: InstanceList = self.fetch(req).await?;
        Ok(list.instances)
    }
}
